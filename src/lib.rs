// src/lib.rs
pub mod errors;
pub mod inference;
pub mod models;
pub mod narrative;
pub mod preprocess;
pub mod service;
pub mod timeseries;
pub mod utils;

pub use errors::{MalformedRecord, WeatherError, WeatherResult};
pub use service::{ErrorPayload, Judgment, WeatherService};
