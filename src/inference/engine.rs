// src/inference/engine.rs
use log::{debug, info};
use std::sync::Arc;

use crate::errors::{WeatherError, WeatherResult};
use crate::inference::classifier::Classifier;
use crate::models::{ClassificationResult, RankedLabel, RawObservation, StandardizedVector};
use crate::preprocess::{FeatureBuilder, PreprocessingDescriptor};

/// Classifies standardized vectors against a loaded descriptor/classifier
/// pair. Holds no per-call state, so one engine can serve concurrent callers.
pub struct InferenceEngine {
    builder: FeatureBuilder,
    classifier: Arc<dyn Classifier>,
}

impl InferenceEngine {
    /// Pairs a descriptor with a classifier, refusing artifacts whose widths
    /// disagree.
    pub fn new(
        descriptor: Arc<PreprocessingDescriptor>,
        classifier: Arc<dyn Classifier>,
    ) -> WeatherResult<Self> {
        if classifier.input_width() != descriptor.feature_count() {
            return Err(WeatherError::configuration(format!(
                "Classifier expects {} inputs but descriptor declares {} features",
                classifier.input_width(),
                descriptor.feature_count()
            )));
        }
        if classifier.output_width() != descriptor.label_count() {
            return Err(WeatherError::configuration(format!(
                "Classifier produces {} outputs but descriptor declares {} labels",
                classifier.output_width(),
                descriptor.label_count()
            )));
        }
        info!(
            "Inference engine ready: {} features -> {} labels",
            descriptor.feature_count(),
            descriptor.label_count()
        );
        Ok(Self {
            builder: FeatureBuilder::new(descriptor),
            classifier,
        })
    }

    pub fn feature_builder(&self) -> &FeatureBuilder {
        &self.builder
    }

    pub fn descriptor(&self) -> &PreprocessingDescriptor {
        self.builder.descriptor()
    }

    pub fn classify(&self, vector: &StandardizedVector) -> WeatherResult<ClassificationResult> {
        let probs = self.distribution(vector)?;
        let idx = argmax(&probs);
        let result = ClassificationResult {
            label: self.descriptor().labels()[idx].clone(),
            confidence: widen_probability(probs[idx]),
            class_index: idx,
        };
        debug!("Classified as {} ({:.4})", result.label, result.confidence);
        Ok(result)
    }

    pub fn classify_observation(&self, raw: &RawObservation) -> WeatherResult<ClassificationResult> {
        let vector = self.builder.build(raw)?;
        self.classify(&vector)
    }

    /// Up to `k` labels by descending probability; equal probabilities keep
    /// vocabulary order.
    pub fn rank(&self, vector: &StandardizedVector, k: usize) -> WeatherResult<Vec<RankedLabel>> {
        let probs = self.distribution(vector)?;
        let mut order: Vec<usize> = (0..probs.len()).collect();
        // Stable sort keeps lower indices first on ties.
        order.sort_by(|a, b| probs[*b].total_cmp(&probs[*a]));

        let labels = self.descriptor().labels();
        Ok(order
            .into_iter()
            .take(k)
            .map(|i| RankedLabel {
                label: labels[i].clone(),
                probability: widen_probability(probs[i]),
            })
            .collect())
    }

    fn distribution(&self, vector: &StandardizedVector) -> WeatherResult<Vec<f32>> {
        let width = self.builder.width();
        if vector.len() != width {
            return Err(WeatherError::validation(
                "<vector>",
                format!("Expected {} values, got {} for", width, vector.len()),
            ));
        }

        let probs = self.classifier.forward(&vector.to_f32())?;

        if probs.len() != self.descriptor().label_count() {
            return Err(WeatherError::inference(format!(
                "Classifier returned {} probabilities for {} labels",
                probs.len(),
                self.descriptor().label_count()
            )));
        }
        if probs.iter().any(|p| !p.is_finite()) {
            return Err(WeatherError::inference(
                "Classifier returned a non-finite probability",
            ));
        }
        Ok(probs)
    }
}

/// Widens a model probability through the shortest decimal that round-trips
/// the f32, so `0.7f32` reports as `0.7` and not `0.699999988079071`.
pub fn widen_probability(p: f32) -> f64 {
    p.to_string().parse::<f64>().unwrap_or_else(|_| f64::from(p))
}

/// Index of the first maximum.
fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::testing::StubClassifier;

    fn descriptor(features: &[&str], labels: &[&str]) -> Arc<PreprocessingDescriptor> {
        Arc::new(
            PreprocessingDescriptor::new(
                features.iter().map(|s| s.to_string()).collect(),
                vec![0.0; features.len()],
                vec![1.0; features.len()],
                labels.iter().map(|s| s.to_string()).collect(),
            )
            .unwrap(),
        )
    }

    fn engine(probs: Vec<f32>) -> InferenceEngine {
        InferenceEngine::new(
            descriptor(&["a", "b", "c"], &["rain", "clear", "cloudy"]),
            Arc::new(StubClassifier::new(3, probs)),
        )
        .unwrap()
    }

    #[test]
    fn test_argmax_selects_clear() {
        let engine = engine(vec![0.2, 0.5, 0.3]);
        let v = StandardizedVector::new(vec![0.0, 0.0, 0.0]).unwrap();
        for _ in 0..10 {
            let result = engine.classify(&v).unwrap();
            assert_eq!(result.label, "clear");
            assert_eq!(result.confidence, 0.5);
            assert_eq!(result.class_index, 1);
        }
    }

    #[test]
    fn test_ties_break_to_lowest_index() {
        assert_eq!(argmax(&[0.4, 0.4, 0.2]), 0);
        assert_eq!(argmax(&[0.1, 0.45, 0.45]), 1);
        let engine = engine(vec![0.25, 0.375, 0.375]);
        let v = StandardizedVector::new(vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(engine.classify(&v).unwrap().label, "clear");
    }

    #[test]
    fn test_widen_probability_keeps_f32_precision() {
        assert_eq!(widen_probability(0.7), 0.7);
        assert_eq!(widen_probability(0.5), 0.5);
        assert_eq!(widen_probability(1.0), 1.0);
        assert_eq!(widen_probability(0.0), 0.0);
    }

    #[test]
    fn test_rank_orders_by_probability() {
        let engine = engine(vec![0.2, 0.5, 0.3]);
        let v = StandardizedVector::new(vec![0.0, 0.0, 0.0]).unwrap();
        let ranked = engine.rank(&v, 5).unwrap();
        let labels: Vec<&str> = ranked.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["clear", "cloudy", "rain"]);
        assert_eq!(engine.rank(&v, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_width_mismatch_is_configuration_error() {
        let err = InferenceEngine::new(
            descriptor(&["a", "b"], &["x", "y"]),
            Arc::new(StubClassifier::new(3, vec![0.5, 0.5])),
        )
        .err()
        .unwrap();
        assert_eq!(err.kind(), "ConfigurationError");

        let err = InferenceEngine::new(
            descriptor(&["a", "b", "c"], &["x", "y"]),
            Arc::new(StubClassifier::new(3, vec![0.2, 0.3, 0.5])),
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("3 outputs"));
    }

    #[test]
    fn test_malformed_vector_is_validation_error() {
        let engine = engine(vec![0.2, 0.5, 0.3]);
        let short = StandardizedVector::new(vec![0.0]).unwrap();
        assert_eq!(engine.classify(&short).unwrap_err().kind(), "ValidationError");
    }

    #[test]
    fn test_bad_distribution_is_inference_error() {
        let engine = engine(vec![0.2, f32::NAN, 0.3]);
        let v = StandardizedVector::new(vec![0.0, 0.0, 0.0]).unwrap();
        assert_eq!(engine.classify(&v).unwrap_err().kind(), "InferenceError");

        let failing = InferenceEngine::new(
            descriptor(&["a"], &["x", "y"]),
            Arc::new(StubClassifier::failing(1, 2)),
        )
        .unwrap();
        let v = StandardizedVector::new(vec![0.0]).unwrap();
        assert_eq!(failing.classify(&v).unwrap_err().kind(), "InferenceError");
    }

    #[test]
    fn test_concurrent_classification() {
        let engine = engine(vec![0.2, 0.5, 0.3]);
        std::thread::scope(|s| {
            for t in 0..8 {
                let engine = &engine;
                s.spawn(move || {
                    let v = StandardizedVector::new(vec![t as f64, 0.0, 0.0]).unwrap();
                    for _ in 0..50 {
                        let r = engine.classify(&v).unwrap();
                        assert_eq!((r.label.as_str(), r.confidence), ("clear", 0.5));
                    }
                });
            }
        });
    }
}
