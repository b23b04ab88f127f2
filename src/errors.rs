// src/errors.rs
//! Error taxonomy for the weather inference core.
//!
//! Configuration errors are fatal and only raised while loading artifacts.
//! Validation and inference errors are per-call and leave the loaded
//! artifacts usable for the next call. Malformed time-series records are
//! never errors: they are skipped and reported as [`MalformedRecord`].

use serde::Serialize;
use thiserror::Error;

pub type WeatherResult<T> = std::result::Result<T, WeatherError>;

#[derive(Debug, Error)]
pub enum WeatherError {
    /// Missing or inconsistent artifacts. Raised at startup only.
    #[error("{0}")]
    Configuration(String),

    /// A raw observation cannot be turned into a feature vector.
    #[error("{reason} feature: {feature}")]
    Validation { feature: String, reason: String },

    /// The numeric forward pass failed or produced an unusable distribution.
    #[error("{0}")]
    Inference(String),
}

impl WeatherError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        WeatherError::Configuration(msg.into())
    }

    pub fn validation(feature: impl Into<String>, reason: impl Into<String>) -> Self {
        WeatherError::Validation {
            feature: feature.into(),
            reason: reason.into(),
        }
    }

    pub fn inference(msg: impl Into<String>) -> Self {
        WeatherError::Inference(msg.into())
    }

    /// Coarse kind tag carried in structured failure responses.
    pub fn kind(&self) -> &'static str {
        match self {
            WeatherError::Configuration(_) => "ConfigurationError",
            WeatherError::Validation { .. } => "ValidationError",
            WeatherError::Inference(_) => "InferenceError",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, WeatherError::Configuration(_))
    }

    /// Offending feature name for validation failures.
    pub fn feature(&self) -> Option<&str> {
        match self {
            WeatherError::Validation { feature, .. } => Some(feature),
            _ => None,
        }
    }
}

/// A narrow time-series record that was dropped during pivoting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MalformedRecord {
    /// Position of the record in the source batch.
    pub index: usize,
    pub raw_timestamp: String,
    pub field: String,
    pub reason: String,
}

impl std::fmt::Display for MalformedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "record #{} (field '{}', timestamp '{}') dropped: {}",
            self.index, self.field, self.raw_timestamp, self.reason
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        assert_eq!(
            WeatherError::configuration("x").kind(),
            "ConfigurationError"
        );
        assert_eq!(
            WeatherError::validation("humidity", "Missing or null").kind(),
            "ValidationError"
        );
        assert_eq!(WeatherError::inference("x").kind(), "InferenceError");
    }

    #[test]
    fn test_validation_message_names_feature() {
        let err = WeatherError::validation("pressure", "Missing or null");
        assert_eq!(err.to_string(), "Missing or null feature: pressure");
        assert_eq!(err.feature(), Some("pressure"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_only_configuration_is_fatal() {
        assert!(WeatherError::configuration("missing model").is_fatal());
        assert!(!WeatherError::inference("bad output").is_fatal());
    }
}
