//! Log subscriber setup for the `infl` binary.
//!
//! Library code only emits `tracing` events inside component spans; the binary
//! installs one subscriber here. Logs always go to a plain-text file. Commands
//! that talk to a human also mirror them to stderr. `predict` does not, so its
//! stdout stays machine-readable.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::AppError;

/// Default filter when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber.
///
/// Calling this twice is an error reported by `tracing_subscriber`; callers
/// treat that as non-fatal.
pub fn init(log_file: &Path, to_stderr: bool) -> Result<(), AppError> {
    if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| AppError::new(2, format!("Failed to create log directory '{}': {e}", parent.display())))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .map_err(|e| AppError::new(2, format!("Failed to open log file '{}': {e}", log_file.display())))?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file));

    let stderr_layer = to_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)))
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| AppError::new(2, format!("Failed to install log subscriber: {e}")))
}
