//! Command-line parsing for the inflation forecaster.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::FeedbackMode;
use crate::fit::BoostParams;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "infl", version, about = "Monthly inflation forecaster (sequence models + boosted trees)")]
pub struct Cli {
    /// Directory holding the model artifacts (defaults to `models/` next to the executable).
    #[arg(long, global = true, env = "INFLATION_MODELS_DIR", value_name = "DIR")]
    pub models_dir: Option<PathBuf>,

    /// Log file; always written, never stdout.
    #[arg(long, global = true, env = "INFLATION_LOG_FILE", default_value = "inflation.log", value_name = "FILE")]
    pub log_file: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Predict inflation from a JSON array of observations; prints a JSON array.
    Predict(PredictArgs),
    /// Forecast from the historical CSV and print a table and plot.
    Forecast(ForecastArgs),
    /// Retrain scalers, boosted model and sequence models from the historical CSV.
    Retrain(RetrainArgs),
    /// Verify every artifact and rewrite the ones that need it.
    Repair,
}

#[derive(Debug, Args, Clone)]
pub struct PredictArgs {
    /// JSON array of `{cpi, inflation, rate, bankRate, date?}` objects, oldest first.
    #[arg(value_name = "JSON")]
    pub json: String,

    /// Number of monthly steps to predict.
    #[arg(long, default_value_t = 1)]
    pub steps: usize,

    /// How each step's prediction is obtained.
    #[arg(long, value_enum, default_value_t = FeedbackMode::Static)]
    pub feedback: FeedbackMode,
}

#[derive(Debug, Args, Clone)]
pub struct ForecastArgs {
    /// Historical CSV (date, cpi, inflation, rate, bank rate).
    #[arg(long, env = "INFLATION_DATA", value_name = "CSV")]
    pub data: PathBuf,

    /// Number of trailing observations used as the input window.
    #[arg(long, default_value_t = 12)]
    pub window: usize,

    /// Number of monthly steps to forecast.
    #[arg(long, default_value_t = 12)]
    pub steps: usize,

    #[arg(long, value_enum, default_value_t = FeedbackMode::Static)]
    pub feedback: FeedbackMode,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Export the forecast to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct RetrainArgs {
    /// Historical CSV (date, cpi, inflation, rate, bank rate).
    #[arg(long, env = "INFLATION_DATA", value_name = "CSV")]
    pub data: PathBuf,

    /// Months in the sample forecast written next to the models.
    #[arg(long, default_value_t = 12)]
    pub months: usize,

    /// Window length for the sample forecast in static/rolling mode.
    #[arg(long, default_value_t = 12)]
    pub window: usize,

    /// Feedback mode for the sample forecast.
    #[arg(long, value_enum, default_value_t = FeedbackMode::Direct)]
    pub feedback: FeedbackMode,

    /// Keep the existing sequence model artifacts instead of refitting them.
    #[arg(long)]
    pub keep_sequence_models: bool,

    /// Lags used by the linear sequence models.
    #[arg(long, default_value_t = 3)]
    pub lags: usize,

    #[command(flatten)]
    pub boost: BoostArgs,
}

/// Boosted-tree hyperparameters.
#[derive(Debug, Args, Clone)]
pub struct BoostArgs {
    /// Number of trees.
    #[arg(long, default_value_t = 200)]
    pub n_estimators: usize,

    #[arg(long, default_value_t = 0.1)]
    pub learning_rate: f64,

    #[arg(long, default_value_t = 6)]
    pub max_depth: usize,

    /// L2 regularization on leaf weights.
    #[arg(long, default_value_t = 1.0)]
    pub reg_lambda: f64,

    #[arg(long, default_value_t = 1.0)]
    pub min_child_weight: f64,

    /// Fraction of rows sampled per tree.
    #[arg(long, default_value_t = 1.0)]
    pub subsample: f64,

    /// Seed for row subsampling.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl From<&BoostArgs> for BoostParams {
    fn from(args: &BoostArgs) -> Self {
        BoostParams {
            n_estimators: args.n_estimators,
            learning_rate: args.learning_rate,
            max_depth: args.max_depth,
            reg_lambda: args.reg_lambda,
            min_child_weight: args.min_child_weight,
            subsample: args.subsample,
            seed: args.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boost_defaults_match_library_defaults() {
        let cli = Cli::try_parse_from(["infl", "retrain", "--data", "x.csv"]).unwrap();
        let Command::Retrain(args) = cli.command else {
            panic!("expected retrain");
        };
        assert_eq!(BoostParams::from(&args.boost), BoostParams::default());
        assert_eq!(args.feedback, FeedbackMode::Direct);
        assert_eq!(args.lags, 3);
    }

    #[test]
    fn global_options_follow_subcommand() {
        let cli = Cli::try_parse_from(["infl", "repair", "--models-dir", "/tmp/m", "--log-file", "a.log"]).unwrap();
        assert_eq!(cli.models_dir, Some(PathBuf::from("/tmp/m")));
        assert_eq!(cli.log_file, PathBuf::from("a.log"));
        assert!(matches!(cli.command, Command::Repair));
    }

    #[test]
    fn predict_takes_positional_json() {
        let cli = Cli::try_parse_from(["infl", "predict", "[]", "--steps", "3", "--feedback", "rolling"]).unwrap();
        let Command::Predict(args) = cli.command else {
            panic!("expected predict");
        };
        assert_eq!(args.json, "[]");
        assert_eq!(args.steps, 3);
        assert_eq!(args.feedback, FeedbackMode::Rolling);
    }
}
