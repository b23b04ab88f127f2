// src/inference/mod.rs
pub mod classifier;
pub mod engine;

pub use classifier::{Classifier, DenseClassifier};
pub use engine::InferenceEngine;
