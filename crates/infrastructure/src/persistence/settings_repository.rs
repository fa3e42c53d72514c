//! Workbench settings persistence.
//!
//! Stores settings in the platform-specific config directory:
//! - Linux: ~/.config/workbench/settings.json
//! - macOS: ~/Library/Application Support/workbench/settings.json
//! - Windows: %APPDATA%/workbench/settings.json

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;
use workbench_domain::WorkbenchSettings;

use crate::serialization::{SerializationError, from_json_bytes, to_json_stable_bytes};

/// Error type for settings operations.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// Could not determine config directory.
    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Repository for workbench settings persistence.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    path: Option<PathBuf>,
}

impl Default for SettingsRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsRepository {
    /// Creates a repository using the platform config directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            path: dirs::config_dir().map(|p| p.join("workbench").join("settings.json")),
        }
    }

    /// Creates a repository reading and writing `path`.
    #[must_use]
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Returns the path where settings are stored, if available.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Loads settings from disk.
    ///
    /// Returns default settings if the file doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(&self) -> Result<WorkbenchSettings, SettingsError> {
        let Some(path) = &self.path else {
            return Ok(WorkbenchSettings::default());
        };

        if !fs::try_exists(path).await? {
            debug!(path = %path.display(), "No settings file; using defaults");
            return Ok(WorkbenchSettings::default());
        }

        let content = fs::read(path).await?;
        let settings = from_json_bytes(&content)?;
        Ok(settings)
    }

    /// Saves settings to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if no config directory is known or the file cannot be
    /// written.
    pub async fn save(&self, settings: &WorkbenchSettings) -> Result<(), SettingsError> {
        let Some(path) = &self.path else {
            return Err(SettingsError::NoConfigDir);
        };

        // Ensure config directory exists
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }

        let content = to_json_stable_bytes(settings)?;
        fs::write(path, content).await?;

        Ok(())
    }
}
