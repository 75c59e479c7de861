//! Stored receipt specimens.
//!
//! Specimens are previously accepted receipt images kept around so a new
//! submission can be verified against them. They live next to the settings
//! file as a single JSON document.

use crate::error::{AppError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// One stored specimen, already encoded for submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specimen {
    /// Where the source image lived when it was captured.
    pub image_path: PathBuf,
    /// Base64 payload ready to embed in a verification request.
    pub base64: String,
    /// Capture time as milliseconds since the Unix epoch.
    pub captured_at_ms: u64,
}

impl Specimen {
    /// Builds a specimen stamped with the current time.
    pub fn captured_now(image_path: impl Into<PathBuf>, base64: impl Into<String>) -> Self {
        Self {
            image_path: image_path.into(),
            base64: base64.into(),
            captured_at_ms: epoch_millis(),
        }
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// JSON-file specimen store under the platform config directory.
///
/// A missing or unreadable file behaves like an empty store; corruption is
/// silently discarded on the next append.
pub struct SpecimenStore {
    path: PathBuf,
}

impl SpecimenStore {
    /// Creates a store at the platform default location.
    pub fn new() -> Result<Self> {
        let dirs = ProjectDirs::from("", "docshot", "docshot").ok_or_else(|| {
            AppError::config("could not determine a config directory")
        })?;
        Ok(Self {
            path: dirs.config_dir().join("specimens.json"),
        })
    }

    /// Creates a store backed by an explicit file path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file this store reads and writes.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// All stored specimens, oldest first.
    pub fn load(&self) -> Vec<Specimen> {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    /// Appends one specimen and persists the collection.
    pub fn append(&self, specimen: Specimen) -> Result<()> {
        let mut specimens = self.load();
        specimens.push(specimen);
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&specimens)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    /// Removes all stored specimens.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    /// Number of stored specimens.
    pub fn count(&self) -> usize {
        self.load().len()
    }
}
