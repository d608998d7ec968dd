//! Model implementations: scalers, the boosted regressor and the channel
//! sequence regressors.
//!
//! Models are plain serializable structs so they can be stored as artifacts
//! and evaluated without any training code.

pub mod boosted;
pub mod regressor;
pub mod scaler;
pub mod sequence;

pub use boosted::*;
pub use regressor::*;
pub use scaler::*;
pub use sequence::*;
