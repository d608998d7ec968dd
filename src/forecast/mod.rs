//! Forecasting: ensemble inference and the multi-step rollout.

pub mod ensemble;
pub mod iterative;

pub use ensemble::{EnsemblePredictor, load_scalers};
pub use iterative::{DAYS_PER_STEP, IterativeForecaster, step_date};
