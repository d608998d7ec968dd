//! Regressor seams.
//!
//! The ensemble only needs two primitive operations:
//! - score a flat feature vector (boosted stage)
//! - score a window of history (per-channel sequence stage)
//!
//! Anything implementing these traits can be plugged into
//! [`crate::forecast::EnsemblePredictor`].

use crate::domain::SequenceWindow;
use crate::error::ForecastError;

/// A model mapping a flat feature vector to one scalar.
pub trait Regressor: Send + Sync {
    fn predict(&self, features: &[f64]) -> Result<f64, ForecastError>;
}

/// A model mapping a window of history to one scalar.
pub trait SequenceRegressor: Send + Sync {
    fn predict_window(&self, window: &SequenceWindow) -> Result<f64, ForecastError>;
}

impl<T: Regressor + ?Sized> Regressor for Box<T> {
    fn predict(&self, features: &[f64]) -> Result<f64, ForecastError> {
        (**self).predict(features)
    }
}

impl<T: SequenceRegressor + ?Sized> SequenceRegressor for Box<T> {
    fn predict_window(&self, window: &SequenceWindow) -> Result<f64, ForecastError> {
        (**self).predict_window(window)
    }
}
