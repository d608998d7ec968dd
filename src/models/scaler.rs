//! Min-max scaling.
//!
//! `scaled = (x - min) / (max - min)` per dimension, with `(min, max)` frozen at
//! fit time. Values outside the fitted range are not clamped, so they map
//! outside `[0, 1]`. A dimension with `max == min` maps every value to `0` and
//! inverts back to `min`.

use serde::{Deserialize, Serialize};

use crate::domain::{FEATURE_WIDTH, FeatureVector};
use crate::error::ForecastError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub min: Vec<f64>,
    pub max: Vec<f64>,
}

impl MinMaxScaler {
    /// Fit per-dimension bounds over `rows`.
    pub fn fit<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self, ForecastError> {
        let first = rows
            .first()
            .ok_or_else(|| ForecastError::EmptyDataset("cannot fit a scaler on zero observations".to_string()))?;
        let dim = first.as_ref().len();
        if dim == 0 {
            return Err(ForecastError::InvalidInput("scaler rows must have at least one dimension".to_string()));
        }

        let mut min = vec![f64::INFINITY; dim];
        let mut max = vec![f64::NEG_INFINITY; dim];
        for (idx, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != dim {
                return Err(ForecastError::InvalidInput(format!(
                    "row {idx} has {} values, expected {dim}",
                    row.len()
                )));
            }
            for (d, &v) in row.iter().enumerate() {
                if !v.is_finite() {
                    return Err(ForecastError::InvalidInput(format!(
                        "row {idx} has a non-finite value in dimension {d}"
                    )));
                }
                min[d] = min[d].min(v);
                max[d] = max[d].max(v);
            }
        }

        Ok(Self { min, max })
    }

    /// Fit a one-dimensional scaler over scalar observations.
    pub fn fit_scalar(values: &[f64]) -> Result<Self, ForecastError> {
        let rows: Vec<[f64; 1]> = values.iter().map(|&v| [v]).collect();
        Self::fit(&rows)
    }

    pub fn dim(&self) -> usize {
        self.min.len()
    }

    pub fn transform(&self, x: &[f64]) -> Result<Vec<f64>, ForecastError> {
        self.check_dim(x)?;
        Ok(x
            .iter()
            .enumerate()
            .map(|(d, &v)| {
                let range = self.max[d] - self.min[d];
                if range == 0.0 { 0.0 } else { (v - self.min[d]) / range }
            })
            .collect())
    }

    pub fn inverse_transform(&self, scaled: &[f64]) -> Result<Vec<f64>, ForecastError> {
        self.check_dim(scaled)?;
        Ok(scaled
            .iter()
            .enumerate()
            .map(|(d, &s)| s * (self.max[d] - self.min[d]) + self.min[d])
            .collect())
    }

    pub fn transform_scalar(&self, x: f64) -> Result<f64, ForecastError> {
        Ok(self.transform(&[x])?[0])
    }

    pub fn inverse_transform_scalar(&self, scaled: f64) -> Result<f64, ForecastError> {
        Ok(self.inverse_transform(&[scaled])?[0])
    }

    fn check_dim(&self, x: &[f64]) -> Result<(), ForecastError> {
        if x.len() != self.dim() {
            return Err(ForecastError::InvalidInput(format!(
                "scaler expects {} values, got {}",
                self.dim(),
                x.len()
            )));
        }
        Ok(())
    }
}

/// Feature scaler over `(cpi, rate, bank_rate)` and target scaler over inflation.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalerPair {
    features: MinMaxScaler,
    target: MinMaxScaler,
}

impl ScalerPair {
    pub fn new(features: MinMaxScaler, target: MinMaxScaler) -> Result<Self, ForecastError> {
        if features.dim() != FEATURE_WIDTH {
            return Err(ForecastError::InvalidInput(format!(
                "feature scaler must have {FEATURE_WIDTH} dimensions, got {}",
                features.dim()
            )));
        }
        if target.dim() != 1 {
            return Err(ForecastError::InvalidInput(format!(
                "target scaler must have 1 dimension, got {}",
                target.dim()
            )));
        }
        Ok(Self { features, target })
    }

    pub fn fit(features: &[FeatureVector], target: &[f64]) -> Result<Self, ForecastError> {
        let rows: Vec<[f64; FEATURE_WIDTH]> = features.iter().map(|f| f.to_array()).collect();
        Self::new(MinMaxScaler::fit(&rows)?, MinMaxScaler::fit_scalar(target)?)
    }

    pub fn features(&self) -> &MinMaxScaler {
        &self.features
    }

    pub fn target(&self) -> &MinMaxScaler {
        &self.target
    }

    pub fn scale_features(&self, x: FeatureVector) -> Result<Vec<f64>, ForecastError> {
        self.features.transform(&x.to_array())
    }

    pub fn scale_target(&self, y: f64) -> Result<f64, ForecastError> {
        self.target.transform_scalar(y)
    }

    pub fn unscale_target(&self, scaled: f64) -> Result<f64, ForecastError> {
        self.target.inverse_transform_scalar(scaled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn fit_on_empty_is_empty_dataset() {
        let rows: Vec<[f64; 3]> = Vec::new();
        assert!(matches!(MinMaxScaler::fit(&rows), Err(ForecastError::EmptyDataset(_))));
        assert!(matches!(MinMaxScaler::fit_scalar(&[]), Err(ForecastError::EmptyDataset(_))));
    }

    #[test]
    fn single_observation_maps_to_zero() {
        let scaler = MinMaxScaler::fit(&[[3.0, -1.0, 7.5]]).unwrap();
        assert_eq!(scaler.min, scaler.max);
        assert_eq!(scaler.transform(&[3.0, -1.0, 7.5]).unwrap(), vec![0.0, 0.0, 0.0]);
        assert_eq!(scaler.inverse_transform(&[0.0, 0.0, 0.0]).unwrap(), vec![3.0, -1.0, 7.5]);
    }

    #[test]
    fn round_trip_within_fit_range() {
        let rows = [[100.0, 0.5, 0.25], [120.0, 4.0, 5.0], [110.0, 2.5, 3.75]];
        let scaler = MinMaxScaler::fit(&rows).unwrap();
        for x in [[100.0, 0.5, 0.25], [104.3, 1.7, 4.99], [119.999, 3.2, 0.3]] {
            let back = scaler.inverse_transform(&scaler.transform(&x).unwrap()).unwrap();
            for d in 0..3 {
                assert_relative_eq!(back[d], x[d], epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn out_of_range_values_are_not_clamped() {
        let scaler = MinMaxScaler::fit_scalar(&[0.0, 10.0]).unwrap();
        assert_relative_eq!(scaler.transform_scalar(15.0).unwrap(), 1.5);
        assert_relative_eq!(scaler.transform_scalar(-5.0).unwrap(), -0.5);
    }

    #[test]
    fn ragged_rows_and_dimension_mismatch_are_invalid() {
        let rows: Vec<Vec<f64>> = vec![vec![1.0, 2.0], vec![1.0]];
        assert!(matches!(MinMaxScaler::fit(&rows), Err(ForecastError::InvalidInput(_))));

        let scaler = MinMaxScaler::fit(&[[1.0, 2.0]]).unwrap();
        assert!(matches!(scaler.transform(&[1.0]), Err(ForecastError::InvalidInput(_))));
    }

    #[test]
    fn pair_requires_expected_dimensions() {
        let one = MinMaxScaler::fit_scalar(&[1.0, 2.0]).unwrap();
        assert!(ScalerPair::new(one.clone(), one).is_err());
    }
}
