//! Multi-step forecasting.
//!
//! Each step predicts inflation, dates the step `30·i` days after the last
//! observation (a fixed-length month, not calendar months), and advances the
//! feature state with [`FeatureVector::advance`]. How the prediction for a step
//! is obtained depends on [`FeedbackMode`].
//!
//! The result is all-or-nothing: a failed step discards the steps before it.

use chrono::{Duration, NaiveDate};
use tracing::Span;

use crate::domain::{FeedbackMode, ForecastStep, InputRow, SequenceWindow};
use crate::error::ForecastError;
use crate::forecast::EnsemblePredictor;

/// Days between consecutive forecast steps.
pub const DAYS_PER_STEP: i64 = 30;

pub struct IterativeForecaster<'a> {
    ensemble: &'a EnsemblePredictor,
    mode: FeedbackMode,
    span: Span,
}

impl<'a> IterativeForecaster<'a> {
    pub fn new(ensemble: &'a EnsemblePredictor, mode: FeedbackMode) -> Self {
        Self {
            ensemble,
            mode,
            span: tracing::info_span!("forecaster", mode = ?mode),
        }
    }

    pub fn forecast(
        &self,
        initial_window: &SequenceWindow,
        last_observed_date: NaiveDate,
        steps: usize,
    ) -> Result<Vec<ForecastStep>, ForecastError> {
        let _guard = self.span.enter();
        if steps == 0 {
            return Err(ForecastError::InvalidInput("forecast needs at least one step".to_string()));
        }

        let mut window = initial_window.clone();
        let mut current = initial_window.last_features();
        let mut out = Vec::with_capacity(steps);

        for i in 1..=steps {
            let pred = match self.mode {
                FeedbackMode::Static | FeedbackMode::Rolling => self.ensemble.predict_one(&window)?,
                FeedbackMode::Direct => self.ensemble.predict_from_features(current)?,
            };

            let date = step_date(last_observed_date, i)?;
            current = current.advance(pred);

            if self.mode == FeedbackMode::Rolling {
                window.roll(InputRow {
                    cpi: current.cpi,
                    inflation: pred,
                    rate: current.rate,
                    bank_rate: current.bank_rate,
                    date: Some(date),
                });
            }

            tracing::debug!(step = i, %date, prediction = pred, "forecast step");
            out.push(ForecastStep {
                date,
                predicted_inflation: pred,
                cpi: current.cpi,
                rate: current.rate,
                bank_rate: current.bank_rate,
            });
        }

        tracing::info!(steps, "forecast complete");
        Ok(out)
    }
}

/// Date of step `i` (1-based).
pub fn step_date(last_observed_date: NaiveDate, i: usize) -> Result<NaiveDate, ForecastError> {
    let days = i64::try_from(i)
        .ok()
        .and_then(|i| i.checked_mul(DAYS_PER_STEP))
        .ok_or_else(|| ForecastError::InvalidInput(format!("step {i} is too far ahead")))?;
    last_observed_date
        .checked_add_signed(Duration::days(days))
        .ok_or_else(|| ForecastError::InvalidInput(format!("step {i} overflows the calendar")))
}
