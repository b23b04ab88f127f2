pub mod artifact_config;
pub mod candle;
pub mod env;
pub mod fingerprint;
pub mod progress_config;
