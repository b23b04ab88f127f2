// src/timeseries/mod.rs
//! Reassembly of narrow (timestamp, field, value) rows into dense observations.

pub mod pivot;

pub use pivot::{
    parse_timestamp, MergePolicy, NarrowRecord, PivotOutcome, PivotedObservation, Pivoter,
    RawNarrowRecord,
};
