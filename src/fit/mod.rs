//! Training routines.
//!
//! - `boost`: gradient-boosted regression trees for the target model
//! - `sequence`: least-squares linear sequence models for the three channels

pub mod boost;
pub mod sequence;

pub use boost::{BoostParams, rmse, train_boosted};
pub use sequence::{fit_linear_sequence_model, fit_sequence_models};
