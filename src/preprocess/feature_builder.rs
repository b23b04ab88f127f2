// src/preprocess/feature_builder.rs
use log::debug;
use ndarray::Array1;
use std::sync::Arc;

use crate::errors::{WeatherError, WeatherResult};
use crate::models::observation::fits_f32;
use crate::models::{RawObservation, StandardizedVector};
use crate::preprocess::descriptor::PreprocessingDescriptor;

/// Raw pressure readings above this are taken to be in Pa rather than kPa.
pub const PRESSURE_PA_THRESHOLD: f64 = 2000.0;
pub const PA_PER_KPA: f64 = 1000.0;

const PRESSURE_FEATURE: &str = "pressure";

/// Brings a raw pressure reading into kPa, the unit the scaler was fit on.
///
/// Gateways report either Pa (~101325) or kPa (~101.3) with no unit tag, so
/// the unit is sniffed from magnitude: anything strictly above
/// [`PRESSURE_PA_THRESHOLD`] is divided by [`PA_PER_KPA`]. Both constants
/// must stay as they are for the trained classifier to see the same inputs.
pub fn normalize_pressure(value: f64) -> f64 {
    if value > PRESSURE_PA_THRESHOLD {
        value / PA_PER_KPA
    } else {
        value
    }
}

/// Applies the unit rule registered for `feature`, if any.
pub fn normalize_units(feature: &str, value: f64) -> f64 {
    match feature {
        PRESSURE_FEATURE => normalize_pressure(value),
        _ => value,
    }
}

/// Turns raw observations into standardized vectors for one descriptor.
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    descriptor: Arc<PreprocessingDescriptor>,
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl FeatureBuilder {
    pub fn new(descriptor: Arc<PreprocessingDescriptor>) -> Self {
        let mean = Array1::from(descriptor.mean().to_vec());
        let scale = Array1::from(descriptor.scale().to_vec());
        Self {
            descriptor,
            mean,
            scale,
        }
    }

    pub fn descriptor(&self) -> &PreprocessingDescriptor {
        &self.descriptor
    }

    pub fn width(&self) -> usize {
        self.descriptor.feature_count()
    }

    /// Unit-normalized values in descriptor order, before standardization.
    pub fn raw_vector(&self, raw: &RawObservation) -> WeatherResult<Vec<f64>> {
        let mut values = Vec::with_capacity(self.width());
        for feature in self.descriptor.features() {
            let value = raw.numeric(feature)?;
            values.push(normalize_units(feature, value));
        }
        Ok(values)
    }

    /// Builds the standardized vector `(x - mean) / scale` for `raw`.
    pub fn build(&self, raw: &RawObservation) -> WeatherResult<StandardizedVector> {
        let x = Array1::from(self.raw_vector(raw)?);
        let standardized = (&x - &self.mean) / &self.scale;

        // Scales are validated non-zero at load, so this only trips on
        // inputs too large for the classifier's f32 input.
        if let Some(pos) = standardized.iter().position(|v| !fits_f32(*v)) {
            let feature = &self.descriptor.features()[pos];
            return Err(WeatherError::validation(
                feature.as_str(),
                "Value out of range after standardization for",
            ));
        }

        debug!("Standardized feature vector: {:?}", standardized);
        Ok(StandardizedVector::from_finite(standardized.to_vec()))
    }
}
