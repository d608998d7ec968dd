//! Least-squares fitting of the linear channel sequence models.
//!
//! For a channel `c` and `L` lags, each training sample is:
//!
//! ```text
//! x_t = [1, row_{t-L}, ..., row_{t-1}]     (rows are (cpi, inflation, rate, bank_rate))
//! y_t = c(t)
//! ```
//!
//! i.e. the model learns to predict the channel's next value from the last `L`
//! rows, which is exactly what it is asked at inference time.

use nalgebra::{DMatrix, DVector};

use crate::domain::{Channel, Observation, ROW_WIDTH};
use crate::error::ForecastError;
use crate::fit::boost::rmse;
use crate::math::solve_least_squares;
use crate::models::{LinearSequenceModel, fill_design_row};

/// Fit one linear sequence model for `channel`.
pub fn fit_linear_sequence_model(
    observations: &[Observation],
    channel: Channel,
    lags: usize,
) -> Result<LinearSequenceModel, ForecastError> {
    if lags == 0 {
        return Err(ForecastError::InvalidInput("sequence models need at least one lag".to_string()));
    }
    if observations.len() <= lags {
        return Err(ForecastError::InsufficientHistory {
            required: lags + 1,
            actual: observations.len(),
        });
    }

    let rows: Vec<[f64; ROW_WIDTH]> = observations.iter().map(|o| o.input_row().values()).collect();
    let n = rows.len() - lags;
    let k = LinearSequenceModel::design_len(lags);

    let mut x = DMatrix::<f64>::zeros(n, k);
    let mut y = DVector::<f64>::zeros(n);
    let mut design = vec![0.0; k];
    for s in 0..n {
        fill_design_row(&rows[s..s + lags], &mut design);
        for (j, v) in design.iter().enumerate() {
            x[(s, j)] = *v;
        }
        y[s] = observations[s + lags].features().get(channel);
    }

    let beta = solve_least_squares(&x, &y).ok_or_else(|| {
        ForecastError::InvalidInput(format!(
            "least squares for the {} sequence model is too ill-conditioned",
            channel.display_name()
        ))
    })?;

    let fitted = &x * &beta;
    tracing::info!(
        channel = channel.display_name(),
        lags,
        samples = n,
        rmse = rmse(fitted.as_slice(), y.as_slice()),
        "fitted linear sequence model"
    );

    Ok(LinearSequenceModel {
        channel,
        lags,
        coefficients: beta.iter().copied().collect(),
    })
}

/// Fit all three channel models in concatenation order.
pub fn fit_sequence_models(
    observations: &[Observation],
    lags: usize,
) -> Result<Vec<(Channel, LinearSequenceModel)>, ForecastError> {
    Channel::ALL
        .iter()
        .map(|&c| Ok((c, fit_linear_sequence_model(observations, c, lags)?)))
        .collect()
}
