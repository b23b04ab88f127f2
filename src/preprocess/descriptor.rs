// src/preprocess/descriptor.rs
use log::{debug, info};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::errors::{WeatherError, WeatherResult};

/// Feature list assumed when a descriptor omits `features`.
pub const DEFAULT_FEATURES: [&str; 3] = ["temperature", "humidity", "pressure"];

#[derive(Debug, Deserialize)]
struct ScalerDocument {
    mean: Vec<f64>,
    std: Vec<f64>,
}

/// On-disk shape of `preprocess.json` as written by the training export.
#[derive(Debug, Deserialize)]
struct DescriptorDocument {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    features: Option<Vec<String>>,
    #[serde(default)]
    units: BTreeMap<String, String>,
    scaler: ScalerDocument,
    labels: Vec<String>,
}

/// Feature order, standardization parameters and label vocabulary the
/// classifier was trained against. Immutable once loaded; share it behind an
/// `Arc` and replace it wholesale to pick up a new export.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessingDescriptor {
    version: Option<String>,
    features: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
    labels: Vec<String>,
    units: BTreeMap<String, String>,
}

impl PreprocessingDescriptor {
    /// Builds and validates a descriptor from its parts.
    pub fn new(
        features: Vec<String>,
        mean: Vec<f64>,
        scale: Vec<f64>,
        labels: Vec<String>,
    ) -> WeatherResult<Self> {
        let descriptor = Self {
            version: None,
            features,
            mean,
            scale,
            labels,
            units: BTreeMap::new(),
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    pub fn from_path(path: impl AsRef<Path>) -> WeatherResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(WeatherError::configuration(format!(
                "preprocess descriptor not found at: {}",
                path.display()
            )));
        }
        let contents = std::fs::read_to_string(path).map_err(|e| {
            WeatherError::configuration(format!(
                "Failed to read preprocess descriptor {}: {}",
                path.display(),
                e
            ))
        })?;
        let descriptor = Self::from_json_str(&contents)?;
        info!(
            "Loaded preprocess descriptor {} (version: {}, features: {}, labels: {})",
            path.display(),
            descriptor.version().unwrap_or("unversioned"),
            descriptor.feature_count(),
            descriptor.label_count()
        );
        Ok(descriptor)
    }

    pub fn from_json_str(contents: &str) -> WeatherResult<Self> {
        let doc: DescriptorDocument = serde_json::from_str(contents).map_err(|e| {
            WeatherError::configuration(format!("Malformed preprocess descriptor: {}", e))
        })?;

        let features = match doc.features {
            Some(features) => features,
            None => {
                debug!("Descriptor has no feature list, using defaults {:?}", DEFAULT_FEATURES);
                DEFAULT_FEATURES.iter().map(|f| f.to_string()).collect()
            }
        };

        let descriptor = Self {
            version: doc.version,
            features,
            mean: doc.scaler.mean,
            scale: doc.scaler.std,
            labels: doc.labels,
            units: doc.units,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    fn validate(&self) -> WeatherResult<()> {
        if self.features.is_empty() {
            return Err(WeatherError::configuration(
                "Preprocess descriptor declares no features",
            ));
        }
        if self.features.len() != self.mean.len() || self.features.len() != self.scale.len() {
            return Err(WeatherError::configuration(format!(
                "Preprocess mismatch: features={}, mean={}, std={}",
                self.features.len(),
                self.mean.len(),
                self.scale.len()
            )));
        }

        let mut seen = HashSet::new();
        for feature in &self.features {
            if !seen.insert(feature.as_str()) {
                return Err(WeatherError::configuration(format!(
                    "Duplicate feature in preprocess descriptor: {}",
                    feature
                )));
            }
        }

        if self.labels.len() < 2 {
            return Err(WeatherError::configuration(format!(
                "Preprocess descriptor needs at least 2 labels, found {}",
                self.labels.len()
            )));
        }

        for (i, feature) in self.features.iter().enumerate() {
            if !self.mean[i].is_finite() {
                return Err(WeatherError::configuration(format!(
                    "Non-finite mean for feature {}",
                    feature
                )));
            }
            // A zero scale would turn every standardized value into inf/NaN.
            if !self.scale[i].is_finite() || self.scale[i] == 0.0 {
                return Err(WeatherError::configuration(format!(
                    "Invalid scale {} for feature {}",
                    self.scale[i], feature
                )));
            }
        }
        Ok(())
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn unit_for(&self, feature: &str) -> Option<&str> {
        self.units.get(feature).map(String::as_str)
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }
}
