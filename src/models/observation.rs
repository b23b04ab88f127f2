// src/models/observation.rs
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::errors::{WeatherError, WeatherResult};

/// One raw observation as received at the invocation boundary.
///
/// Values are kept as JSON so extra keys (device ids, timestamps, previous
/// predictions) can ride along untouched. Only the features declared by the
/// descriptor are ever coerced to numbers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawObservation {
    values: Map<String, JsonValue>,
}

impl RawObservation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(payload: &str) -> WeatherResult<Self> {
        let value: JsonValue = serde_json::from_str(payload).map_err(|e| {
            WeatherError::validation("<payload>", format!("Invalid JSON payload ({})", e))
        })?;
        Self::from_value(value)
    }

    pub fn from_value(value: JsonValue) -> WeatherResult<Self> {
        match value {
            JsonValue::Object(values) => Ok(Self { values }),
            other => Err(WeatherError::validation(
                "<payload>",
                format!("Expected a JSON object, got {}", json_type_name(&other)),
            )),
        }
    }

    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let mut obs = Self::new();
        for (k, v) in pairs {
            obs.insert(k, v);
        }
        obs
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<JsonValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<JsonValue> {
        self.values.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Reads a declared feature as a finite number.
    ///
    /// Numbers, numeric strings and booleans are accepted. Absent or `null`
    /// values fail with a validation error naming the feature.
    pub fn numeric(&self, name: &str) -> WeatherResult<f64> {
        let value = match self.values.get(name) {
            None | Some(JsonValue::Null) => {
                return Err(WeatherError::validation(name, "Missing or null"))
            }
            Some(v) => v,
        };

        let parsed = match value {
            JsonValue::Number(n) => n.as_f64(),
            JsonValue::String(s) => s.trim().parse::<f64>().ok(),
            JsonValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        };

        match parsed {
            Some(v) if v.is_finite() => Ok(v),
            Some(_) => Err(WeatherError::validation(name, "Non-finite")),
            None => Err(WeatherError::validation(
                name,
                format!("Not numeric ({})", json_type_name(value)),
            )),
        }
    }

    pub fn as_map(&self) -> &Map<String, JsonValue> {
        &self.values
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// True when `v` stays finite after narrowing to the classifier's f32 input.
pub(crate) fn fits_f32(v: f64) -> bool {
    (v as f32).is_finite()
}

/// Standardized feature vector, ordered like the descriptor's feature list.
/// Every element is finite in single precision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandardizedVector(Vec<f64>);

impl StandardizedVector {
    /// Wraps pre-standardized values, rejecting elements that are non-finite
    /// or overflow f32.
    pub fn new(values: Vec<f64>) -> WeatherResult<Self> {
        if let Some(pos) = values.iter().position(|v| !fits_f32(*v)) {
            return Err(WeatherError::validation(
                format!("#{}", pos),
                "Non-finite standardized value at position",
            ));
        }
        Ok(Self(values))
    }

    pub(crate) fn from_finite(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Single-precision copy for the classifier input.
    pub fn to_f32(&self) -> Vec<f32> {
        self.0.iter().map(|v| *v as f32).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_coercion() {
        let obs = RawObservation::from_value(json!({
            "temperature": 21.5,
            "humidity": "55",
            "rain": true,
            "device_id": "gw-01"
        }))
        .unwrap();

        assert_eq!(obs.numeric("temperature").unwrap(), 21.5);
        assert_eq!(obs.numeric("humidity").unwrap(), 55.0);
        assert_eq!(obs.numeric("rain").unwrap(), 1.0);
        let err = obs.numeric("device_id").unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
        assert_eq!(err.feature(), Some("device_id"));
    }

    #[test]
    fn test_missing_and_null_are_rejected() {
        let obs = RawObservation::from_value(json!({ "pressure": null })).unwrap();
        let err = obs.numeric("pressure").unwrap_err();
        assert_eq!(err.feature(), Some("pressure"));
        assert!(err.to_string().contains("Missing or null"));

        let err = obs.numeric("tof").unwrap_err();
        assert_eq!(err.feature(), Some("tof"));
    }

    #[test]
    fn test_payload_must_be_object() {
        let err = RawObservation::from_json_str("[1, 2, 3]").unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
        assert!(RawObservation::from_json_str("{not json").is_err());
    }

    #[test]
    fn test_standardized_vector_rejects_non_finite() {
        assert!(StandardizedVector::new(vec![0.0, f64::NAN]).is_err());
        assert!(StandardizedVector::new(vec![f64::INFINITY]).is_err());
        let err = StandardizedVector::new(vec![0.5, 1e39]).unwrap_err();
        assert_eq!(err.feature(), Some("#1"));
        assert!(StandardizedVector::new(vec![-1e300]).is_err());
        assert!(StandardizedVector::new(vec![f32::MAX as f64]).is_ok());
        let v = StandardizedVector::new(vec![1.0, -2.0]).unwrap();
        assert_eq!(v.to_f32(), vec![1.0f32, -2.0f32]);
    }
}
