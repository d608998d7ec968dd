//! Shared pipeline logic behind the CLI subcommands.
//!
//! Each `run_*` function does the work and returns the computed outputs; the
//! caller in `app` decides how to present them (JSON, tables, plots).
//!
//! retrain: ingest -> scalers -> boosted model -> sequence models -> sample forecast -> save -> re-verify

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDate};

use crate::domain::{
    Channel, FeatureVector, ForecastConfig, ForecastStep, InputRow, PredictConfig, RetrainConfig, SequenceWindow,
};
use crate::error::ForecastError;
use crate::fit::{fit_sequence_models, rmse, train_boosted};
use crate::forecast::{EnsemblePredictor, IterativeForecaster};
use crate::io::artifact::{ArtifactName, ArtifactStore, RepairOutcome};
use crate::io::export::write_forecast_csv;
use crate::io::ingest::{HistoricalData, load_history};
use crate::models::{BoostedRegressor, Regressor, ScalerPair, SequenceModel, SequenceRegressor};

/// File written next to the artifacts by `retrain`.
pub const FUTURE_PREDICTIONS_FILE: &str = "future_predictions.csv";

/// Parse the `predict` JSON argument into window rows (oldest first).
pub fn parse_input_rows(json: &str) -> Result<Vec<InputRow>, ForecastError> {
    serde_json::from_str(json).map_err(|e| ForecastError::InvalidInput(format!("invalid input JSON: {e}")))
}

/// Load the models and forecast from the rows given on the command line.
pub fn run_predict(config: &PredictConfig) -> Result<Vec<ForecastStep>, ForecastError> {
    let rows = parse_input_rows(&config.input_json)?;
    let window = SequenceWindow::new(rows)?;
    let last_date = window.last_row().date.unwrap_or_else(today);

    let store = ArtifactStore::open(&config.models_dir);
    let ensemble = EnsemblePredictor::load(&store)?;
    IterativeForecaster::new(&ensemble, config.feedback).forecast(&window, last_date, config.steps)
}

/// All computed outputs of a single `infl forecast` run.
#[derive(Debug, Clone)]
pub struct ForecastRun {
    pub history: HistoricalData,
    pub window_len: usize,
    pub steps: Vec<ForecastStep>,
}

/// Forecast from the tail of the historical CSV.
pub fn run_forecast(config: &ForecastConfig) -> Result<ForecastRun, ForecastError> {
    if config.window == 0 {
        return Err(ForecastError::InvalidInput("window must be at least 1".to_string()));
    }
    let history = load_history(&config.csv_path)?;
    let window = trailing_window(&history, config.window)?;

    let store = ArtifactStore::open(&config.models_dir);
    let ensemble = EnsemblePredictor::load(&store)?;
    let steps = IterativeForecaster::new(&ensemble, config.feedback).forecast(&window, history.last_date(), config.steps)?;

    if let Some(path) = &config.export {
        write_forecast_csv(path, &steps)?;
    }

    Ok(ForecastRun {
        history,
        window_len: window.len(),
        steps,
    })
}

fn trailing_window(history: &HistoricalData, len: usize) -> Result<SequenceWindow, ForecastError> {
    if history.rows_used() < len {
        return Err(ForecastError::InsufficientHistory {
            required: len,
            actual: history.rows_used(),
        });
    }
    SequenceWindow::from_observations(&history.observations, len)
}

/// Everything `infl retrain` produced.
#[derive(Debug, Clone)]
pub struct RetrainReport {
    pub history: HistoricalData,
    pub n_trees: usize,
    /// In-sample RMSE of the boosted model, in inflation units.
    pub train_rmse: f64,
    /// Kind of each channel model now in the store.
    pub sequence_models: Vec<(Channel, &'static str)>,
    pub refit_sequence_models: bool,
    pub forecast: Vec<ForecastStep>,
    pub forecast_path: PathBuf,
    pub verification: Vec<(ArtifactName, RepairOutcome)>,
}

/// Retrain the models from the historical CSV and write them to the store.
///
/// Everything is fitted and the sample forecast computed before the first
/// artifact is written, so a failed run leaves the models directory and
/// `future_predictions.csv` as they were.
pub fn run_retrain(config: &RetrainConfig) -> Result<RetrainReport, ForecastError> {
    let history = load_history(&config.csv_path)?;
    let observations = &history.observations;

    let features: Vec<FeatureVector> = observations.iter().map(|o| o.features()).collect();
    let targets: Vec<f64> = observations.iter().map(|o| o.inflation).collect();
    let scalers = ScalerPair::fit(&features, &targets)?;

    let x_scaled = features
        .iter()
        .map(|&f| scalers.scale_features(f))
        .collect::<Result<Vec<_>, _>>()?;
    let y_scaled = targets
        .iter()
        .map(|&y| scalers.scale_target(y))
        .collect::<Result<Vec<_>, _>>()?;

    let booster = train_boosted(&x_scaled, &y_scaled, &config.boost)?;
    let fitted = x_scaled
        .iter()
        .map(|x| booster.predict(x).and_then(|p| scalers.unscale_target(p)))
        .collect::<Result<Vec<_>, _>>()?;
    let train_rmse = rmse(&fitted, &targets);
    tracing::info!(trees = booster.n_trees(), train_rmse, "trained boosted regressor");

    let store = ArtifactStore::open(&config.models_dir);
    let sequence_models: Vec<(Channel, SequenceModel)> = if config.keep_sequence_models {
        Channel::ALL
            .iter()
            .map(|&c| Ok((c, store.load::<SequenceModel>(ArtifactName::for_channel(c).file_name())?)))
            .collect::<Result<_, ForecastError>>()?
    } else {
        fit_sequence_models(observations, config.sequence_lags)?
            .into_iter()
            .map(|(c, m)| (c, SequenceModel::Linear(m)))
            .collect()
    };

    let ensemble = in_memory_ensemble(&sequence_models, &booster, &scalers)?;
    let window = SequenceWindow::from_observations(observations, config.window)?;
    let forecast = IterativeForecaster::new(&ensemble, config.feedback).forecast(&window, history.last_date(), config.months)?;

    let store = ArtifactStore::create(&config.models_dir)?;
    store.save(ArtifactName::FeatureScaler.file_name(), scalers.features())?;
    store.save(ArtifactName::TargetScaler.file_name(), scalers.target())?;
    store.save(ArtifactName::BoostedModel.file_name(), &booster)?;
    let mut written = vec![ArtifactName::FeatureScaler, ArtifactName::TargetScaler, ArtifactName::BoostedModel];
    if !config.keep_sequence_models {
        for (channel, model) in &sequence_models {
            let name = ArtifactName::for_channel(*channel);
            store.save(name.file_name(), model)?;
            written.push(name);
        }
    }

    let forecast_path = store.path(FUTURE_PREDICTIONS_FILE);
    write_forecast_csv(&forecast_path, &forecast)?;

    let verification = verify_written(&store, &written)?;

    Ok(RetrainReport {
        n_trees: booster.n_trees(),
        train_rmse,
        sequence_models: sequence_models.iter().map(|(c, m)| (*c, m.kind_name())).collect(),
        refit_sequence_models: !config.keep_sequence_models,
        forecast,
        forecast_path,
        verification,
        history,
    })
}

/// Ensemble over freshly fitted models, before any of them is saved.
fn in_memory_ensemble(
    sequence_models: &[(Channel, SequenceModel)],
    booster: &BoostedRegressor,
    scalers: &ScalerPair,
) -> Result<EnsemblePredictor, ForecastError> {
    let channel = |channel: Channel| -> Result<Box<dyn SequenceRegressor>, ForecastError> {
        sequence_models
            .iter()
            .find(|(c, _)| *c == channel)
            .map(|(_, m)| Box::new(m.clone()) as Box<dyn SequenceRegressor>)
            .ok_or_else(|| ForecastError::inference(channel.display_name(), "no sequence model was fitted"))
    };
    Ok(EnsemblePredictor::new(
        channel(Channel::Cpi)?,
        channel(Channel::Rate)?,
        channel(Channel::BankRate)?,
        Box::new(booster.clone()),
        Arc::new(scalers.clone()),
    ))
}

fn verify_written(
    store: &ArtifactStore,
    written: &[ArtifactName],
) -> Result<Vec<(ArtifactName, RepairOutcome)>, ForecastError> {
    written
        .iter()
        .map(|&name| {
            let outcome = store.repair_named(name)?;
            if outcome != RepairOutcome::Verified {
                tracing::warn!(artifact = name.file_name(), ?outcome, "artifact changed during re-verification");
            }
            Ok((name, outcome))
        })
        .collect()
}

/// Status of one artifact after `infl repair`.
#[derive(Debug, Clone, PartialEq)]
pub enum RepairStatus {
    Done(RepairOutcome),
    Missing,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepairEntry {
    pub name: ArtifactName,
    pub status: RepairStatus,
}

/// Verify and repair every known artifact in `models_dir`.
///
/// Never fails as a whole; each artifact gets its own status.
pub fn run_repair(models_dir: &Path) -> Vec<RepairEntry> {
    let store = ArtifactStore::open(models_dir);
    ArtifactName::ALL
        .iter()
        .map(|&name| {
            let status = match store.repair_named(name) {
                Ok(outcome) => RepairStatus::Done(outcome),
                Err(ForecastError::ArtifactNotFound { .. }) => {
                    tracing::warn!(artifact = name.file_name(), "artifact missing");
                    RepairStatus::Missing
                }
                Err(err) => {
                    tracing::error!(artifact = name.file_name(), error = %err, "artifact repair failed");
                    RepairStatus::Failed(err.to_string())
                }
            };
            RepairEntry { name, status }
        })
        .collect()
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
