//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - installs the log subscriber
//! - runs the pipeline for the chosen subcommand
//! - prints reports/plots and writes optional exports

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::cli::{Cli, Command, ForecastArgs, PredictArgs, RetrainArgs};
use crate::domain::{ForecastConfig, PredictConfig, RetrainConfig};
use crate::error::AppError;
use crate::fit::BoostParams;

pub mod pipeline;

/// Entry point for the `infl` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env file is fine.
    dotenvy::dotenv().ok();
    let Cli {
        models_dir,
        log_file,
        command,
    } = Cli::parse();
    let models_dir = models_dir.unwrap_or_else(default_models_dir);

    match command {
        Command::Predict(args) => handle_predict(&args, models_dir, &log_file),
        Command::Forecast(args) => {
            crate::logging::init(&log_file, true)?;
            handle_forecast(&args, models_dir)
        }
        Command::Retrain(args) => {
            crate::logging::init(&log_file, true)?;
            handle_retrain(&args, models_dir)
        }
        Command::Repair => {
            crate::logging::init(&log_file, true)?;
            handle_repair(&models_dir)
        }
    }
}

/// `models/` next to the executable, or under the working directory if that is unknown.
pub fn default_models_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("models")))
        .unwrap_or_else(|| PathBuf::from("models"))
}

/// stdout carries exactly one JSON document: the predictions or `{"error": ...}`.
fn handle_predict(args: &PredictArgs, models_dir: PathBuf, log_file: &Path) -> Result<(), AppError> {
    init_predict_logging(log_file);

    let config = predict_config_from_args(args, models_dir);
    tracing::info!(models_dir = %config.models_dir.display(), steps = config.steps, "predict");

    match pipeline::run_predict(&config) {
        Ok(steps) => {
            let predictions: Vec<f64> = steps.iter().map(|s| s.predicted_inflation).collect();
            println!("{}", serde_json::json!(predictions));
            Ok(())
        }
        Err(err) => {
            tracing::error!(error = %err, "prediction failed");
            println!("{}", serde_json::json!({ "error": err.to_string() }));
            Err(err.into())
        }
    }
}

/// Install file logging for `predict`. Returns whether a subscriber is active.
///
/// An unusable log file only disables logging; the prediction still runs.
fn init_predict_logging(log_file: &Path) -> bool {
    crate::logging::init(log_file, false).is_ok()
}

fn handle_forecast(args: &ForecastArgs, models_dir: PathBuf) -> Result<(), AppError> {
    let config = forecast_config_from_args(args, models_dir);
    let run = pipeline::run_forecast(&config)?;

    println!("{}", crate::report::format_forecast_summary(&run, config.feedback));
    println!("{}", crate::report::format_forecast_table(&run.steps));

    if config.plot {
        let plot = crate::plot::render_forecast_plot(
            &run.history.observations,
            &run.steps,
            config.plot_width,
            config.plot_height,
        );
        println!("{plot}");
    }
    if let Some(path) = &config.export {
        println!("Exported forecast to {}", path.display());
    }
    Ok(())
}

fn handle_retrain(args: &RetrainArgs, models_dir: PathBuf) -> Result<(), AppError> {
    let config = retrain_config_from_args(args, models_dir);
    tracing::info!(
        models_dir = %config.models_dir.display(),
        data = %config.csv_path.display(),
        "retraining"
    );
    let report = pipeline::run_retrain(&config)?;
    println!("{}", crate::report::format_retrain_summary(&report));
    Ok(())
}

fn handle_repair(models_dir: &Path) -> Result<(), AppError> {
    tracing::info!(models_dir = %models_dir.display(), "repairing artifacts");
    let entries = pipeline::run_repair(models_dir);
    print!("{}", crate::report::format_repair_report(&entries));

    let failed = entries
        .iter()
        .filter(|e| matches!(e.status, pipeline::RepairStatus::Failed(_)))
        .count();
    if failed > 0 {
        return Err(AppError::new(4, format!("{failed} artifact(s) could not be repaired")));
    }
    Ok(())
}

pub fn predict_config_from_args(args: &PredictArgs, models_dir: PathBuf) -> PredictConfig {
    PredictConfig {
        models_dir,
        input_json: args.json.clone(),
        steps: args.steps,
        feedback: args.feedback,
    }
}

pub fn forecast_config_from_args(args: &ForecastArgs, models_dir: PathBuf) -> ForecastConfig {
    ForecastConfig {
        models_dir,
        csv_path: args.data.clone(),
        window: args.window,
        steps: args.steps,
        feedback: args.feedback,
        plot: !args.no_plot,
        plot_width: args.width,
        plot_height: args.height,
        export: args.export.clone(),
    }
}

pub fn retrain_config_from_args(args: &RetrainArgs, models_dir: PathBuf) -> RetrainConfig {
    RetrainConfig {
        models_dir,
        csv_path: args.data.clone(),
        months: args.months,
        window: args.window,
        feedback: args.feedback,
        keep_sequence_models: args.keep_sequence_models,
        sequence_lags: args.lags,
        boost: BoostParams::from(&args.boost),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FeedbackMode;

    #[test]
    fn forecast_args_convert_to_config() {
        let cli = Cli::try_parse_from(["infl", "forecast", "--data", "h.csv", "--no-plot", "--steps", "6"]).unwrap();
        let Command::Forecast(args) = cli.command else {
            panic!("expected forecast");
        };
        let config = forecast_config_from_args(&args, PathBuf::from("m"));
        assert!(!config.plot);
        assert_eq!(config.steps, 6);
        assert_eq!(config.window, 12);
        assert_eq!(config.feedback, FeedbackMode::Static);
        assert_eq!(config.models_dir, PathBuf::from("m"));
    }

    #[test]
    fn unopenable_log_file_does_not_stop_predict() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened as a log file.
        assert!(!init_predict_logging(dir.path()));
    }

    #[test]
    fn default_models_dir_ends_in_models() {
        assert!(default_models_dir().ends_with("models"));
    }
}
