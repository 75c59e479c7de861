//! Persisted pipeline settings.
//!
//! This module handles loading and saving the compression and submission
//! configuration that survives between runs: the planner mode and its
//! quality presets, shared dimension bounds, and the endpoint parameters.

use crate::compression::CompressionMode;
use crate::error::{AppError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use url::Url;

/// User-configurable settings persisted between sessions.
///
/// Stored as JSON in the user's config directory (e.g.
/// `~/.config/docshot/settings.json` on Linux). Fields absent from a stored
/// document take their default values, so documents written by older
/// versions keep loading.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Active planner mode.
    pub mode: CompressionMode,
    /// Quality used in fixed mode, on the (0, 1] scale.
    pub fixed_quality: f64,
    /// Tiered-mode quality for inputs under 1 MiB.
    pub light_quality: f64,
    /// Tiered-mode quality for inputs between 1 and 5 MiB.
    pub medium_quality: f64,
    /// Tiered-mode quality for inputs of 5 MiB and above.
    pub aggressive_quality: f64,
    /// Maximum output width shared by every strategy.
    pub max_width: u32,
    /// Maximum output height shared by every strategy.
    pub max_height: u32,
    /// Whether codecs should preserve image metadata.
    pub keep_metadata: bool,
    /// Submission endpoint; empty means not configured.
    pub api_endpoint: String,
    /// Submission request timeout in milliseconds.
    pub api_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: CompressionMode::Tiered,
            fixed_quality: 0.8,
            light_quality: 0.8,
            medium_quality: 0.7,
            aggressive_quality: 0.6,
            max_width: 2000,
            max_height: 2000,
            keep_metadata: false,
            api_endpoint: String::new(),
            api_timeout_ms: 30_000,
        }
    }
}

impl Settings {
    /// Validates every field, naming the offending one on failure.
    pub fn validate(&self) -> Result<()> {
        check_quality("fixed_quality", self.fixed_quality)?;
        check_quality("light_quality", self.light_quality)?;
        check_quality("medium_quality", self.medium_quality)?;
        check_quality("aggressive_quality", self.aggressive_quality)?;
        check_dimension("max_width", self.max_width)?;
        check_dimension("max_height", self.max_height)?;
        if !(1_000..=120_000).contains(&self.api_timeout_ms) {
            return Err(AppError::settings(
                "api_timeout_ms must be between 1000 and 120000",
            ));
        }
        if !self.api_endpoint.is_empty() && Url::parse(&self.api_endpoint).is_err() {
            return Err(AppError::settings("api_endpoint must be a valid URL"));
        }
        Ok(())
    }
}

fn check_quality(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 || value > 1.0 {
        return Err(AppError::settings(format!(
            "{field} must be within (0, 1]"
        )));
    }
    Ok(())
}

fn check_dimension(field: &str, value: u32) -> Result<()> {
    if !(100..=4096).contains(&value) {
        return Err(AppError::settings(format!(
            "{field} must be between 100 and 4096"
        )));
    }
    Ok(())
}

/// Storage backend for [`Settings`].
///
/// The pipeline itself only ever consumes a loaded snapshot; stores are
/// read at workflow start and written by the settings management surface.
pub trait SettingsStore: Send + Sync {
    /// Loads settings, yielding defaults when nothing usable is stored.
    fn load(&self) -> Settings;
    /// Persists the given settings.
    fn save(&self, settings: &Settings) -> Result<()>;
    /// Removes any stored settings so the next load returns defaults.
    fn reset(&self) -> Result<()>;
}

/// JSON-file settings store under the platform config directory.
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    /// Creates a store at the platform default location.
    pub fn new() -> Result<Self> {
        let dirs = ProjectDirs::from("", "docshot", "docshot").ok_or_else(|| {
            AppError::config("could not determine a config directory")
        })?;
        Ok(Self {
            path: dirs.config_dir().join("settings.json"),
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
}

impl SettingsStore for JsonSettingsStore {
    fn load(&self) -> Settings {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// In-memory settings store for tests and embedded callers.
pub struct MemorySettingsStore {
    inner: Mutex<Settings>,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Mutex::new(settings),
        }
    }
}

impl Default for MemorySettingsStore {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Settings {
        self.inner.lock().map(|guard| guard.clone()).unwrap_or_default()
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = settings.clone();
        }
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        self.save(&Settings::default())
    }
}
