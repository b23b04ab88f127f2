// src/service.rs
//! Process-level entry point: loads the artifact pair once and answers
//! classification requests with a verbalized judgment.

use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;

use crate::errors::{WeatherError, WeatherResult};
use crate::inference::{Classifier, DenseClassifier, InferenceEngine};
use crate::models::{RankedLabel, RawObservation};
use crate::narrative::{Locale, Tier};
use crate::preprocess::PreprocessingDescriptor;
use crate::utils::artifact_config::ArtifactConfig;
use crate::utils::candle::default_device;
use crate::utils::fingerprint::verify_artifact;

/// Top label with its confidence put into words.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Judgment {
    pub label: String,
    pub confidence: f64,
    pub tier: Tier,
    pub tier_label: &'static str,
    pub locale: Locale,
}

/// Structured failure body: `{"error": ..., "type": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPayload {
    pub error: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl From<&WeatherError> for ErrorPayload {
    fn from(err: &WeatherError) -> Self {
        Self {
            error: err.to_string(),
            kind: err.kind().to_string(),
        }
    }
}

pub struct WeatherService {
    engine: InferenceEngine,
    default_locale: Locale,
}

impl WeatherService {
    /// Loads and cross-checks the descriptor and classifier named by `config`.
    /// Any failure here is a configuration error and the service must not start.
    pub fn load(config: &ArtifactConfig) -> WeatherResult<Self> {
        let preprocess_path = config.preprocess_path();
        let model_path = config.model_path();

        for (what, path) in [("preprocess descriptor", &preprocess_path), ("model", &model_path)] {
            if !path.exists() {
                return Err(WeatherError::configuration(format!(
                    "{} not found at: {}",
                    what,
                    path.display()
                )));
            }
        }

        verify_artifact(&preprocess_path, config.preprocess_sha256.as_deref())?;
        verify_artifact(&model_path, config.model_sha256.as_deref())?;

        let descriptor = PreprocessingDescriptor::from_path(&preprocess_path)?;
        let classifier = DenseClassifier::load(&model_path, default_device())?;
        info!(
            "✅ Weather classifier loaded: {} layers, labels {:?}",
            classifier.layer_count(),
            descriptor.labels()
        );

        Self::from_parts(
            descriptor,
            Arc::new(classifier),
            Locale::from_tag(&config.default_locale),
        )
    }

    pub fn from_parts(
        descriptor: PreprocessingDescriptor,
        classifier: Arc<dyn Classifier>,
        default_locale: Locale,
    ) -> WeatherResult<Self> {
        let engine = InferenceEngine::new(Arc::new(descriptor), classifier)?;
        Ok(Self {
            engine,
            default_locale,
        })
    }

    pub fn engine(&self) -> &InferenceEngine {
        &self.engine
    }

    pub fn default_locale(&self) -> Locale {
        self.default_locale
    }

    /// Classifies one observation. `locale` overrides the configured default.
    pub fn judge(&self, raw: &RawObservation, locale: Option<&str>) -> WeatherResult<Judgment> {
        let locale = locale.map(Locale::from_tag).unwrap_or(self.default_locale);
        let result = self.engine.classify_observation(raw).map_err(|e| {
            warn!("Classification failed ({}): {}", e.kind(), e);
            e
        })?;
        let tier = Tier::from_confidence(result.confidence);
        Ok(Judgment {
            label: result.label,
            confidence: result.confidence,
            tier,
            tier_label: tier.label(locale),
            locale,
        })
    }

    pub fn judge_json(&self, payload: &str, locale: Option<&str>) -> WeatherResult<Judgment> {
        let raw = RawObservation::from_json_str(payload)?;
        self.judge(&raw, locale)
    }

    /// Up to `k` labels for one observation, most probable first.
    pub fn rank(&self, raw: &RawObservation, k: usize) -> WeatherResult<Vec<RankedLabel>> {
        let vector = self.engine.feature_builder().build(raw)?;
        self.engine.rank(&vector, k)
    }
}
