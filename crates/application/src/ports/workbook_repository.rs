//! Workbook repository port
//!
//! Defines the interface for workbook persistence. A workbook is saved as up
//! to three files: the workbook itself, a private parameters file next to it
//! and an optional global parameters file.

use std::path::Path;

use async_trait::async_trait;
use workbench_domain::{ParameterFile, Workbook, WorkbookFiles};

/// Errors that can occur during workbook operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Workbook not found.
    #[error("Workbook not found: {0}")]
    NotFound(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The file was written by an incompatible version.
    #[error("Unsupported workbook version {found} (expected at most {supported})")]
    UnsupportedVersion {
        /// Version found in the file.
        found: u32,
        /// Highest supported version.
        supported: u32,
    },
}

/// Raw files read for one workbook, before merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredWorkbook {
    /// The workbook file.
    pub workbook: Workbook,
    /// The private parameters file, if present.
    pub private: Option<ParameterFile>,
    /// The global parameters file, if configured and present.
    pub global: Option<ParameterFile>,
}

/// Repository trait for workbook persistence.
#[async_trait]
pub trait WorkbookRepository: Send + Sync {
    /// Loads the workbook at `path` together with its private and global
    /// parameter files.
    ///
    /// # Errors
    /// Returns `RepositoryError::NotFound` if the workbook doesn't exist.
    async fn load(&self, path: &Path) -> Result<StoredWorkbook, RepositoryError>;

    /// Saves the workbook files. Empty private or global files are removed
    /// rather than written.
    ///
    /// # Errors
    /// Returns an error if a file cannot be written.
    async fn save(&self, path: &Path, files: &WorkbookFiles) -> Result<(), RepositoryError>;
}
