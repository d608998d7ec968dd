//! `inflation-forecast` library crate.
//!
//! The binary (`infl`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the ensemble and forecaster can be embedded elsewhere (e.g., a web backend)
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod fit;
pub mod forecast;
pub mod io;
pub mod logging;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
