// src/narrative/mod.rs
pub mod context;
pub mod verbalizer;

pub use context::{
    format_observation, latest_prediction, sensor_context, weather_context, CONFIDENCE_FIELD,
    PREDICTION_FIELD,
};
pub use verbalizer::{verbalize, Locale, Tier};
