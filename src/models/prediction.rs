// src/models/prediction.rs
use serde::Serialize;

/// Top-class judgment returned by the inference engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub label: String,
    /// Probability assigned to `label`. Widened from the model's f32 output,
    /// so it carries no more precision than single precision.
    pub confidence: f64,
    /// Position of `label` in the descriptor's label vocabulary.
    #[serde(skip)]
    pub class_index: usize,
}

/// One entry of a ranked (top-k) prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedLabel {
    pub label: String,
    pub probability: f64,
}
