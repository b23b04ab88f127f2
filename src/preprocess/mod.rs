// src/preprocess/mod.rs
//! Descriptor loading and raw observation -> standardized vector conversion.

pub mod descriptor;
pub mod feature_builder;

pub use descriptor::{PreprocessingDescriptor, DEFAULT_FEATURES};
pub use feature_builder::{
    normalize_pressure, normalize_units, FeatureBuilder, PA_PER_KPA, PRESSURE_PA_THRESHOLD,
};
