//! Input/output helpers.
//!
//! - model artifact store with atomic, verified writes (`artifact`)
//! - historical CSV ingest + validation (`ingest`)
//! - forecast exports (`export`)

pub mod artifact;
pub mod export;
pub mod ingest;

pub use artifact::{Artifact, ArtifactName, ArtifactStore, RepairOutcome};
pub use export::*;
pub use ingest::*;
