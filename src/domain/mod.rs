//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - historical observations and model inputs (`Observation`, `InputRow`, `SequenceWindow`)
//! - the feature triple and its update rule (`FeatureVector`)
//! - forecast outputs (`ForecastStep`) and run configuration

pub mod types;

pub use types::*;
