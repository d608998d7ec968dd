//! Error types.
//!
//! - `ForecastError` is the library taxonomy returned by the store, scalers,
//!   models and forecaster.
//! - `AppError` is what the binary reports: a message plus a process exit code.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the forecasting library.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("Artifact '{name}' not found at '{}'", path.display())]
    ArtifactNotFound { name: String, path: PathBuf },

    #[error("Artifact '{name}' is corrupt: {reason}")]
    ArtifactCorrupt { name: String, reason: String },

    #[error("Artifact '{name}' failed verification: {reason}")]
    ArtifactVerification { name: String, reason: String },

    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    #[error("Missing required columns: {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("Inference failed in {stage}: {reason}")]
    Inference { stage: String, reason: String },

    #[error("Insufficient history: need at least {required} rows, got {actual}")]
    InsufficientHistory { required: usize, actual: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ForecastError {
    pub fn inference(stage: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Inference {
            stage: stage.into(),
            reason: reason.to_string(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Exit code used when this error reaches the binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            ForecastError::Schema { .. } | ForecastError::InvalidInput(_) | ForecastError::Io { .. } => 2,
            ForecastError::EmptyDataset(_) | ForecastError::InsufficientHistory { .. } => 3,
            ForecastError::ArtifactNotFound { .. }
            | ForecastError::ArtifactCorrupt { .. }
            | ForecastError::ArtifactVerification { .. }
            | ForecastError::Inference { .. } => 4,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ForecastError> for AppError {
    fn from(err: ForecastError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
