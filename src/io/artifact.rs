//! Named model artifacts on disk.
//!
//! Every artifact is stored as a small JSON envelope:
//!
//! ```text
//! {
//!   "kind": "min_max_scaler",
//!   "payload": { ... }
//! }
//! ```
//!
//! The canonical encoding is `serde_json`'s pretty printer with `\n` line
//! endings plus a trailing newline. `repair` rewrites files that only decode
//! after tolerant normalization (BOM, CRLF, trailing padding) into that form.
//!
//! Writes never expose a partially written or unverified file:
//! temp file -> fsync -> verify -> backup -> rename -> post-check -> drop backup.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::Span;

use crate::domain::Channel;
use crate::error::ForecastError;
use crate::models::{BoostedRegressor, MinMaxScaler, SequenceModel};

/// A value that can be stored in an [`ArtifactStore`].
pub trait Artifact: Serialize + DeserializeOwned {
    /// Envelope tag; loading a file with a different tag is a corruption error.
    const KIND: &'static str;
}

impl Artifact for MinMaxScaler {
    const KIND: &'static str = "min_max_scaler";
}

impl Artifact for BoostedRegressor {
    const KIND: &'static str = "boosted_regressor";
}

impl Artifact for SequenceModel {
    const KIND: &'static str = "sequence_model";
}

/// The fixed set of artifacts in a models directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactName {
    CpiSequenceModel,
    RateSequenceModel,
    BankRateSequenceModel,
    BoostedModel,
    TargetScaler,
    FeatureScaler,
}

impl ArtifactName {
    pub const ALL: [ArtifactName; 6] = [
        ArtifactName::CpiSequenceModel,
        ArtifactName::RateSequenceModel,
        ArtifactName::BankRateSequenceModel,
        ArtifactName::BoostedModel,
        ArtifactName::TargetScaler,
        ArtifactName::FeatureScaler,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            ArtifactName::CpiSequenceModel => "cpi_sequence_model.json",
            ArtifactName::RateSequenceModel => "rate_sequence_model.json",
            ArtifactName::BankRateSequenceModel => "bank_rate_sequence_model.json",
            ArtifactName::BoostedModel => "boosted_model.json",
            ArtifactName::TargetScaler => "target_scaler.json",
            ArtifactName::FeatureScaler => "feature_scaler.json",
        }
    }

    pub fn for_channel(channel: Channel) -> Self {
        match channel {
            Channel::Cpi => ArtifactName::CpiSequenceModel,
            Channel::Rate => ArtifactName::RateSequenceModel,
            Channel::BankRate => ArtifactName::BankRateSequenceModel,
        }
    }
}

/// Result of [`ArtifactStore::repair`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairOutcome {
    /// Decoded strictly and already canonical; untouched.
    Verified,
    /// Decoded only after normalization; rewritten canonically.
    Repaired,
    /// Unreadable; replaced by the backup copy.
    RestoredFromBackup,
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    kind: &'a str,
    payload: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    kind: String,
    payload: T,
}

/// Loads and saves artifacts in one directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    span: Span,
}

impl ArtifactStore {
    /// Open an existing directory for reading and writing.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let span = tracing::info_span!("artifact_store", dir = %dir.display());
        Self { dir, span }
    }

    /// Open `dir`, creating it first if needed.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self, ForecastError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| ForecastError::io(format!("Failed to create models directory '{}'", dir.display()), e))?;
        Ok(Self::open(dir))
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    fn temp_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.tmp"))
    }

    fn backup_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.bak"))
    }

    /// Load an artifact, falling back to its backup if the primary is corrupt.
    pub fn load<T: Artifact>(&self, name: &str) -> Result<T, ForecastError> {
        let _guard = self.span.enter();
        let bytes = self.read(name, &self.path(name))?;

        match decode::<T>(name, &bytes) {
            Ok(value) => {
                tracing::debug!(artifact = name, kind = T::KIND, "loaded artifact");
                Ok(value)
            }
            Err(err) => match self.restore_backup::<T>(name)? {
                Some(value) => Ok(value),
                None => {
                    tracing::error!(artifact = name, error = %err, "artifact is corrupt and has no usable backup");
                    Err(err)
                }
            },
        }
    }

    /// Save an artifact atomically, verifying it before it replaces the old file.
    pub fn save<T: Artifact>(&self, name: &str, value: &T) -> Result<(), ForecastError> {
        let _guard = self.span.enter();
        let bytes = encode(name, value)?;
        let path = self.path(name);
        let tmp = self.temp_path(name);
        let bak = self.backup_path(name);

        if let Err(e) = write_synced(&tmp, &bytes) {
            let _ = fs::remove_file(&tmp);
            return Err(ForecastError::io(format!("Failed to write '{}'", tmp.display()), e));
        }

        if let Err(err) = self.verify_file::<T>(name, &tmp, &bytes) {
            let _ = fs::remove_file(&tmp);
            tracing::error!(artifact = name, error = %err, "verification failed; existing artifact left unchanged");
            return Err(err);
        }

        let had_backup = path.is_file();
        if had_backup {
            if let Err(e) = fs::copy(&path, &bak) {
                let _ = fs::remove_file(&tmp);
                return Err(ForecastError::io(format!("Failed to back up '{}'", path.display()), e));
            }
        }

        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            if had_backup {
                let _ = fs::remove_file(&bak);
            }
            return Err(ForecastError::io(format!("Failed to replace '{}'", path.display()), e));
        }

        if let Err(err) = self.verify_file::<T>(name, &path, &bytes) {
            if had_backup {
                let _ = fs::rename(&bak, &path);
                tracing::error!(artifact = name, error = %err, "post-write check failed; restored backup");
            } else {
                let _ = fs::remove_file(&path);
            }
            return Err(err);
        }

        if had_backup {
            let _ = fs::remove_file(&bak);
        }
        tracing::info!(artifact = name, kind = T::KIND, bytes = bytes.len(), "saved artifact");
        Ok(())
    }

    /// Normalize an artifact to the canonical encoding.
    pub fn repair<T: Artifact>(&self, name: &str) -> Result<RepairOutcome, ForecastError> {
        let _guard = self.span.enter();
        let bytes = self.read(name, &self.path(name))?;

        if let Ok(value) = decode::<T>(name, &bytes) {
            if encode(name, &value)? == bytes {
                tracing::info!(artifact = name, "artifact verified");
                return Ok(RepairOutcome::Verified);
            }
        }

        match decode::<T>(name, &normalize(&bytes)) {
            Ok(value) => {
                tracing::warn!(artifact = name, "artifact needs repair; rewriting canonically");
                self.save(name, &value)?;
                Ok(RepairOutcome::Repaired)
            }
            Err(err) => match self.restore_backup::<T>(name)? {
                Some(_) => Ok(RepairOutcome::RestoredFromBackup),
                None => {
                    tracing::error!(artifact = name, error = %err, "artifact cannot be repaired");
                    Err(err)
                }
            },
        }
    }

    /// [`repair`](Self::repair) with the artifact type implied by `name`.
    pub fn repair_named(&self, name: ArtifactName) -> Result<RepairOutcome, ForecastError> {
        let file = name.file_name();
        match name {
            ArtifactName::CpiSequenceModel | ArtifactName::RateSequenceModel | ArtifactName::BankRateSequenceModel => {
                self.repair::<SequenceModel>(file)
            }
            ArtifactName::BoostedModel => self.repair::<BoostedRegressor>(file),
            ArtifactName::TargetScaler | ArtifactName::FeatureScaler => self.repair::<MinMaxScaler>(file),
        }
    }

    fn read(&self, name: &str, path: &Path) -> Result<Vec<u8>, ForecastError> {
        fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ForecastError::ArtifactNotFound {
                    name: name.to_string(),
                    path: path.to_path_buf(),
                }
            } else {
                ForecastError::io(format!("Failed to read '{}'", path.display()), e)
            }
        })
    }

    fn verify_file<T: Artifact>(&self, name: &str, path: &Path, expected: &[u8]) -> Result<(), ForecastError> {
        let verification = |reason: String| ForecastError::ArtifactVerification {
            name: name.to_string(),
            reason,
        };
        let written = fs::read(path).map_err(|e| verification(format!("re-read failed: {e}")))?;
        if written != expected {
            return Err(verification("bytes on disk differ from the encoded artifact".to_string()));
        }
        let value = decode::<T>(name, &written).map_err(|e| verification(e.to_string()))?;
        let reencoded = encode(name, &value)?;
        if reencoded != written {
            return Err(verification("artifact does not round-trip to identical bytes".to_string()));
        }
        Ok(())
    }

    /// Replace a corrupt primary with its backup if the backup decodes.
    ///
    /// The restored file is written canonically and the backup is removed.
    fn restore_backup<T: Artifact>(&self, name: &str) -> Result<Option<T>, ForecastError> {
        let bak = self.backup_path(name);
        let Ok(bytes) = fs::read(&bak) else {
            return Ok(None);
        };
        let Ok(value) = decode::<T>(name, &normalize(&bytes)) else {
            tracing::warn!(artifact = name, "backup copy is also unreadable");
            return Ok(None);
        };

        let path = self.path(name);
        fs::copy(&bak, &path)
            .map_err(|e| ForecastError::io(format!("Failed to restore '{}' from backup", path.display()), e))?;
        self.save(name, &value)?;
        match fs::remove_file(&bak) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(ForecastError::io(format!("Failed to remove backup '{}'", bak.display()), e)),
        }
        tracing::warn!(artifact = name, backup = %bak.display(), "restored artifact from backup");
        Ok(Some(value))
    }
}

fn encode<T: Artifact>(name: &str, value: &T) -> Result<Vec<u8>, ForecastError> {
    let envelope = EnvelopeRef {
        kind: T::KIND,
        payload: value,
    };
    let mut bytes = serde_json::to_vec_pretty(&envelope).map_err(|e| ForecastError::ArtifactVerification {
        name: name.to_string(),
        reason: format!("encoding failed: {e}"),
    })?;
    bytes.push(b'\n');
    Ok(bytes)
}

fn decode<T: Artifact>(name: &str, bytes: &[u8]) -> Result<T, ForecastError> {
    let corrupt = |reason: String| ForecastError::ArtifactCorrupt {
        name: name.to_string(),
        reason,
    };
    let envelope: Envelope<T> = serde_json::from_slice(bytes).map_err(|e| corrupt(e.to_string()))?;
    if envelope.kind != T::KIND {
        return Err(corrupt(format!("expected kind '{}', found '{}'", T::KIND, envelope.kind)));
    }
    Ok(envelope.payload)
}

/// Undo common transport damage: UTF-8 BOM, CRLF/CR line endings, and
/// trailing NUL padding or whitespace.
fn normalize(bytes: &[u8]) -> Vec<u8> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut out = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter().peekable();
    while let Some(&b) = iter.next() {
        if b == b'\r' {
            if iter.peek() != Some(&&b'\n') {
                out.push(b'\n');
            }
            continue;
        }
        out.push(b);
    }
    while matches!(out.last().copied(), Some(0 | b' ' | b'\t' | b'\n')) {
        out.pop();
    }
    out
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scaler(lo: f64, hi: f64) -> MinMaxScaler {
        MinMaxScaler {
            min: vec![lo, lo],
            max: vec![hi, hi],
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path());
        let value = scaler(0.25, 7.5);

        store.save("s.json", &value).unwrap();
        let back: MinMaxScaler = store.load("s.json").unwrap();
        assert_eq!(back, value);
        assert!(!store.temp_path("s.json").exists());
        assert!(!store.backup_path("s.json").exists());
    }

    #[test]
    fn missing_artifact_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path());
        let err = store.load::<MinMaxScaler>("absent.json").unwrap_err();
        assert!(matches!(err, ForecastError::ArtifactNotFound { .. }));
    }

    #[test]
    fn failed_verification_leaves_original_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path());
        store.save("s.json", &scaler(0.0, 1.0)).unwrap();
        let before = fs::read(store.path("s.json")).unwrap();

        // NaN encodes as `null`, which does not decode back into an f64.
        let err = store.save("s.json", &scaler(f64::NAN, 1.0)).unwrap_err();
        assert!(matches!(err, ForecastError::ArtifactVerification { .. }));

        assert_eq!(fs::read(store.path("s.json")).unwrap(), before);
        assert!(!store.temp_path("s.json").exists());
        assert!(!store.backup_path("s.json").exists());
    }

    #[test]
    fn wrong_kind_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path());
        store.save("s.json", &scaler(0.0, 1.0)).unwrap();
        let err = store.load::<BoostedRegressor>("s.json").unwrap_err();
        assert!(matches!(err, ForecastError::ArtifactCorrupt { .. }));
    }

    #[test]
    fn corrupt_primary_is_restored_from_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path());
        let value = scaler(1.0, 2.0);
        store.save("s.json", &value).unwrap();
        let good = fs::read(store.path("s.json")).unwrap();

        fs::write(store.backup_path("s.json"), &good).unwrap();
        fs::write(store.path("s.json"), b"{\"kind\": \"min_max_sca").unwrap();

        let back: MinMaxScaler = store.load("s.json").unwrap();
        assert_eq!(back, value);
        assert_eq!(fs::read(store.path("s.json")).unwrap(), good);
        assert!(!store.backup_path("s.json").exists());
    }

    #[test]
    fn damaged_backup_is_restored_in_canonical_form() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path());
        let value = scaler(-1.5, 7.25);
        store.save("s.json", &value).unwrap();
        let canonical = fs::read(store.path("s.json")).unwrap();

        let mut damaged = b"\xEF\xBB\xBF".to_vec();
        damaged.extend(String::from_utf8(canonical.clone()).unwrap().replace('\n', "\r\n").into_bytes());
        fs::write(store.backup_path("s.json"), &damaged).unwrap();
        fs::write(store.path("s.json"), b"not json").unwrap();

        let back: MinMaxScaler = store.load("s.json").unwrap();
        assert_eq!(back, value);
        assert_eq!(fs::read(store.path("s.json")).unwrap(), canonical);
        assert!(!store.backup_path("s.json").exists());
        assert_eq!(store.repair::<MinMaxScaler>("s.json").unwrap(), RepairOutcome::Verified);
    }

    #[test]
    fn repair_normalizes_line_endings_then_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path());
        let value = scaler(3.0, 4.0);
        store.save("s.json", &value).unwrap();
        let canonical = fs::read(store.path("s.json")).unwrap();

        let mut damaged = b"\xEF\xBB\xBF".to_vec();
        for &b in &canonical {
            if b == b'\n' {
                damaged.extend_from_slice(b"\r\n");
            } else {
                damaged.push(b);
            }
        }
        damaged.extend_from_slice(&[0, 0, 0]);
        fs::write(store.path("s.json"), &damaged).unwrap();

        assert_eq!(store.repair::<MinMaxScaler>("s.json").unwrap(), RepairOutcome::Repaired);
        assert_eq!(fs::read(store.path("s.json")).unwrap(), canonical);
        assert_eq!(store.repair::<MinMaxScaler>("s.json").unwrap(), RepairOutcome::Verified);
    }

    #[test]
    fn repair_without_backup_reports_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path());
        fs::write(store.path("s.json"), b"not json").unwrap();
        let err = store.repair::<MinMaxScaler>("s.json").unwrap_err();
        assert!(matches!(err, ForecastError::ArtifactCorrupt { .. }));
    }

    #[test]
    fn normalize_strips_transport_damage() {
        assert_eq!(normalize(b"\xEF\xBB\xBFa\r\nb\rc\0\0 \n"), b"a\nb\nc".to_vec());
    }

    #[test]
    fn repair_named_dispatches_on_artifact_type() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path());
        store.save(ArtifactName::FeatureScaler.file_name(), &scaler(0.0, 1.0)).unwrap();
        fs::copy(
            store.path(ArtifactName::FeatureScaler.file_name()),
            store.path(ArtifactName::BoostedModel.file_name()),
        )
        .unwrap();

        assert_eq!(store.repair_named(ArtifactName::FeatureScaler).unwrap(), RepairOutcome::Verified);
        assert!(matches!(
            store.repair_named(ArtifactName::BoostedModel),
            Err(ForecastError::ArtifactCorrupt { .. })
        ));
        assert!(matches!(
            store.repair_named(ArtifactName::TargetScaler),
            Err(ForecastError::ArtifactNotFound { .. })
        ));
    }
}
