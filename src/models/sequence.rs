//! Per-channel sequence regressors.
//!
//! Two model kinds can sit behind a channel:
//!
//! - `Lstm`: a single LSTM layer followed by a one-unit dense head, evaluated
//!   from weights exported in the Keras layout (`kernel` is `input_dim × 4·units`,
//!   `recurrent_kernel` is `units × 4·units`, gate order `i, f, c, o`).
//! - `Linear`: an autoregressive model over the last `lags` rows of the
//!   window, fitted by least squares in `fit::sequence`.
//!
//! Both consume raw (unscaled) `(cpi, inflation, rate, bank_rate)` rows.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::domain::{Channel, ROW_WIDTH, SequenceWindow};
use crate::error::ForecastError;
use crate::models::SequenceRegressor;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum SequenceModel {
    Lstm(LstmRegressor),
    Linear(LinearSequenceModel),
}

impl SequenceModel {
    pub fn kind_name(&self) -> &'static str {
        match self {
            SequenceModel::Lstm(_) => "lstm",
            SequenceModel::Linear(_) => "linear",
        }
    }
}

impl SequenceRegressor for SequenceModel {
    fn predict_window(&self, window: &SequenceWindow) -> Result<f64, ForecastError> {
        match self {
            SequenceModel::Lstm(m) => m.predict_window(window),
            SequenceModel::Linear(m) => m.predict_window(window),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmRegressor {
    pub units: usize,
    pub kernel: Vec<Vec<f64>>,
    pub recurrent_kernel: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    pub dense_kernel: Vec<f64>,
    pub dense_bias: f64,
}

impl LstmRegressor {
    /// Check that every weight block has the shape implied by `units`.
    pub fn validate(&self) -> Result<(), String> {
        let gates = 4 * self.units;
        if self.units == 0 {
            return Err("LSTM must have at least one unit".to_string());
        }
        if self.kernel.len() != ROW_WIDTH || self.kernel.iter().any(|r| r.len() != gates) {
            return Err(format!("kernel must be {ROW_WIDTH}×{gates}"));
        }
        if self.recurrent_kernel.len() != self.units || self.recurrent_kernel.iter().any(|r| r.len() != gates) {
            return Err(format!("recurrent_kernel must be {}×{gates}", self.units));
        }
        if self.bias.len() != gates {
            return Err(format!("bias must have {gates} values"));
        }
        if self.dense_kernel.len() != self.units {
            return Err(format!("dense_kernel must have {} values", self.units));
        }
        Ok(())
    }

    fn predict_window(&self, window: &SequenceWindow) -> Result<f64, ForecastError> {
        self.validate().map_err(|e| ForecastError::inference("LSTM", e))?;

        let u = self.units;
        // Transposed so that gate pre-activations are `w * x + r * h + b`.
        let w = DMatrix::from_fn(4 * u, ROW_WIDTH, |g, d| self.kernel[d][g]);
        let r = DMatrix::from_fn(4 * u, u, |g, k| self.recurrent_kernel[k][g]);
        let b = DVector::from_column_slice(&self.bias);

        let mut h = DVector::<f64>::zeros(u);
        let mut c = DVector::<f64>::zeros(u);
        for row in window.rows() {
            let x = DVector::from_column_slice(&row.values());
            let z = &w * x + &r * &h + &b;

            let i = z.rows(0, u).map(sigmoid);
            let f = z.rows(u, u).map(sigmoid);
            let g = z.rows(2 * u, u).map(f64::tanh);
            let o = z.rows(3 * u, u).map(sigmoid);

            c = f.component_mul(&c) + i.component_mul(&g);
            h = o.component_mul(&c.map(f64::tanh));
        }

        let dense = DVector::from_column_slice(&self.dense_kernel);
        let y = dense.dot(&h) + self.dense_bias;
        if !y.is_finite() {
            return Err(ForecastError::inference("LSTM", "non-finite output"));
        }
        Ok(y)
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearSequenceModel {
    pub channel: Channel,
    pub lags: usize,
    /// Intercept first, then `lags × 4` weights, oldest row first.
    pub coefficients: Vec<f64>,
}

impl LinearSequenceModel {
    pub fn design_len(lags: usize) -> usize {
        1 + lags * ROW_WIDTH
    }

    fn predict_window(&self, window: &SequenceWindow) -> Result<f64, ForecastError> {
        if self.coefficients.len() != Self::design_len(self.lags) {
            return Err(ForecastError::inference(
                "linear sequence model",
                format!(
                    "expected {} coefficients for {} lags, got {}",
                    Self::design_len(self.lags),
                    self.lags,
                    self.coefficients.len()
                ),
            ));
        }
        let rows = lagged_rows(window, self.lags);
        let mut design = vec![0.0; self.coefficients.len()];
        fill_design_row(&rows, &mut design);

        let y: f64 = design.iter().zip(&self.coefficients).map(|(x, b)| x * b).sum();
        if !y.is_finite() {
            return Err(ForecastError::inference("linear sequence model", "non-finite output"));
        }
        Ok(y)
    }
}

/// The newest `lags` rows of `window`, oldest first.
///
/// A window shorter than `lags` is left-padded by repeating its oldest row.
fn lagged_rows(window: &SequenceWindow, lags: usize) -> Vec<[f64; ROW_WIDTH]> {
    let rows = window.rows();
    let oldest = rows[0].values();
    let pad = lags.saturating_sub(rows.len());
    std::iter::repeat_n(oldest, pad)
        .chain(rows[rows.len().saturating_sub(lags)..].iter().map(|r| r.values()))
        .collect()
}

/// Fill a design row from consecutive window rows.
///
/// The row includes the constant term first (intercept).
///
/// # Panics
/// Panics if `out.len() != 1 + history.len() * 4`.
pub fn fill_design_row(history: &[[f64; ROW_WIDTH]], out: &mut [f64]) {
    out[0] = 1.0;
    for (k, row) in history.iter().enumerate() {
        out[1 + k * ROW_WIDTH..1 + (k + 1) * ROW_WIDTH].copy_from_slice(row);
    }
}
