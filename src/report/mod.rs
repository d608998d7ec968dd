//! Reporting utilities: formatted terminal output for each subcommand.

pub mod format;

pub use format::*;
