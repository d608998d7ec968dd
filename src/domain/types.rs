//! Shared domain types.
//!
//! These types are kept small and serializable so they can be:
//!
//! - read from the historical CSV and the `predict` JSON argument
//! - passed through the ensemble and forecaster
//! - exported to CSV/JSON

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;

/// Number of columns in a window row: `(cpi, inflation, rate, bank_rate)`.
pub const ROW_WIDTH: usize = 4;

/// Number of dimensions in a [`FeatureVector`].
pub const FEATURE_WIDTH: usize = 3;

/// One historical observation, as ingested from CSV.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub cpi: f64,
    pub inflation: f64,
    pub rate: f64,
    pub bank_rate: f64,
}

impl Observation {
    pub fn features(&self) -> FeatureVector {
        FeatureVector {
            cpi: self.cpi,
            rate: self.rate,
            bank_rate: self.bank_rate,
        }
    }

    pub fn input_row(&self) -> InputRow {
        InputRow {
            cpi: self.cpi,
            inflation: self.inflation,
            rate: self.rate,
            bank_rate: self.bank_rate,
            date: Some(self.date),
        }
    }
}

/// The `(cpi, rate, bank_rate)` triple consumed by the boosted regressor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub cpi: f64,
    pub rate: f64,
    pub bank_rate: f64,
}

impl FeatureVector {
    pub fn new(cpi: f64, rate: f64, bank_rate: f64) -> Self {
        Self { cpi, rate, bank_rate }
    }

    pub fn to_array(self) -> [f64; FEATURE_WIDTH] {
        [self.cpi, self.rate, self.bank_rate]
    }

    pub fn get(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Cpi => self.cpi,
            Channel::Rate => self.rate,
            Channel::BankRate => self.bank_rate,
        }
    }

    /// Advance the features by one month given the predicted inflation.
    ///
    /// CPI compounds by the predicted percentage; both rates drift 5% of the
    /// way towards the prediction.
    pub fn advance(self, predicted_inflation: f64) -> Self {
        Self {
            cpi: self.cpi * (1.0 + predicted_inflation / 100.0),
            rate: 0.95 * self.rate + 0.05 * predicted_inflation,
            bank_rate: 0.95 * self.bank_rate + 0.05 * predicted_inflation,
        }
    }
}

/// One row of model input, as accepted on the `predict` command line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputRow {
    pub cpi: f64,
    pub inflation: f64,
    pub rate: f64,
    #[serde(rename = "bankRate")]
    pub bank_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

impl InputRow {
    pub fn values(&self) -> [f64; ROW_WIDTH] {
        [self.cpi, self.inflation, self.rate, self.bank_rate]
    }

    pub fn features(&self) -> FeatureVector {
        FeatureVector::new(self.cpi, self.rate, self.bank_rate)
    }
}

/// A non-empty, ordered history of input rows fed to the sequence models.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceWindow {
    rows: Vec<InputRow>,
}

impl SequenceWindow {
    pub fn new(rows: Vec<InputRow>) -> Result<Self, ForecastError> {
        if rows.is_empty() {
            return Err(ForecastError::EmptyDataset(
                "a sequence window needs at least one row".to_string(),
            ));
        }
        if let Some(bad) = rows.iter().position(|r| !r.values().iter().all(|v| v.is_finite())) {
            return Err(ForecastError::InvalidInput(format!(
                "window row {bad} contains a non-finite value"
            )));
        }
        Ok(Self { rows })
    }

    /// Build a window from the last `len` observations (or all of them if fewer).
    pub fn from_observations(observations: &[Observation], len: usize) -> Result<Self, ForecastError> {
        let start = observations.len().saturating_sub(len.max(1));
        Self::new(observations[start..].iter().map(Observation::input_row).collect())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[InputRow] {
        &self.rows
    }

    pub fn last_row(&self) -> &InputRow {
        // Non-empty by construction.
        &self.rows[self.rows.len() - 1]
    }

    pub fn last_features(&self) -> FeatureVector {
        self.last_row().features()
    }

    /// Slide the window forward by one row, keeping its length.
    pub fn roll(&mut self, row: InputRow) {
        self.rows.push(row);
        self.rows.remove(0);
    }
}

/// One step of a multi-step forecast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastStep {
    pub date: NaiveDate,
    pub predicted_inflation: f64,
    pub cpi: f64,
    pub rate: f64,
    #[serde(rename = "bankRate")]
    pub bank_rate: f64,
}

/// One of the three sequence-model output streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Cpi,
    Rate,
    BankRate,
}

impl Channel {
    /// Channels in the order their outputs are concatenated.
    pub const ALL: [Channel; 3] = [Channel::Cpi, Channel::Rate, Channel::BankRate];

    pub fn display_name(self) -> &'static str {
        match self {
            Channel::Cpi => "CPI",
            Channel::Rate => "Rate",
            Channel::BankRate => "Bank Rate",
        }
    }
}

/// How each forecast step obtains its prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackMode {
    /// Reuse the initial window for every step; only the reported features evolve.
    Static,
    /// Append each step's estimated row to the window and drop the oldest.
    Rolling,
    /// Skip the sequence models and score the evolving features directly.
    Direct,
}

/// Settings for `infl predict`.
#[derive(Debug, Clone)]
pub struct PredictConfig {
    pub models_dir: PathBuf,
    pub input_json: String,
    pub steps: usize,
    pub feedback: FeedbackMode,
}

/// Settings for `infl forecast`.
#[derive(Debug, Clone)]
pub struct ForecastConfig {
    pub models_dir: PathBuf,
    pub csv_path: PathBuf,
    pub window: usize,
    pub steps: usize,
    pub feedback: FeedbackMode,
    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
    pub export: Option<PathBuf>,
}

/// Settings for `infl retrain`.
#[derive(Debug, Clone)]
pub struct RetrainConfig {
    pub models_dir: PathBuf,
    pub csv_path: PathBuf,
    pub months: usize,
    pub window: usize,
    pub feedback: FeedbackMode,
    pub keep_sequence_models: bool,
    pub sequence_lags: usize,
    pub boost: crate::fit::BoostParams,
}
