pub mod observation;
pub mod prediction;

pub use observation::{RawObservation, StandardizedVector};
pub use prediction::{ClassificationResult, RankedLabel};
