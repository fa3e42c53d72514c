//! File-based workbook repository implementation.
//!
//! A workbook is stored as:
//! ```text
//! project/
//!   api.workbench        requests, workbook parameters, default selections
//!   api.workbench-priv   private parameters (kept out of version control)
//! ~/.config/workbench/
//!   globals.json         global parameters shared by every workbook
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::fs;
use tracing::{debug, info, warn};
use workbench_application::ports::{RepositoryError, StoredWorkbook, WorkbookRepository};
use workbench_domain::{ParameterFile, WORKBOOK_VERSION, Workbook, WorkbookFiles};

use crate::serialization::{SerializationError, from_json_bytes, to_json_stable_bytes};

fn serialization_error(error: SerializationError) -> RepositoryError {
    RepositoryError::Serialization(error.to_string())
}

fn check_version(found: u32) -> Result<(), RepositoryError> {
    if found > WORKBOOK_VERSION {
        return Err(RepositoryError::UnsupportedVersion {
            found,
            supported: WORKBOOK_VERSION,
        });
    }
    Ok(())
}

/// Reads and parses `path`, or returns `None` if it does not exist.
async fn read_optional<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, RepositoryError> {
    if !fs::try_exists(path).await? {
        return Ok(None);
    }
    let content = fs::read(path).await?;
    let value = from_json_bytes(&content).map_err(serialization_error)?;
    Ok(Some(value))
}

/// Writes `file` to `path`, or removes `path` when there is nothing to keep.
async fn write_parameters(path: &Path, file: &ParameterFile) -> Result<(), RepositoryError> {
    if file.is_empty() {
        if fs::try_exists(path).await? {
            fs::remove_file(path).await?;
            debug!(path = %path.display(), "Removed empty parameter file");
        }
        return Ok(());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let content = to_json_stable_bytes(file).map_err(serialization_error)?;
    fs::write(path, content).await?;
    Ok(())
}

/// Workbook repository backed by JSON files.
#[derive(Debug, Clone, Default)]
pub struct FileWorkbookRepository {
    global_path: Option<PathBuf>,
}

impl FileWorkbookRepository {
    /// Creates a repository without global parameters.
    #[must_use]
    pub const fn new() -> Self {
        Self { global_path: None }
    }

    /// Reads and writes global parameters at `path`.
    #[must_use]
    pub fn with_global_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_path = Some(path.into());
        self
    }

    /// Default location of the global parameters file, in the platform
    /// config directory.
    #[must_use]
    pub fn default_global_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("workbench").join("globals.json"))
    }

    /// Path of the private parameters file of a workbook: the workbook path
    /// with `-priv` appended to its extension.
    #[must_use]
    pub fn private_path(workbook: &Path) -> PathBuf {
        let extension = workbook
            .extension()
            .and_then(OsStr::to_str)
            .unwrap_or("workbench");
        workbook.with_extension(format!("{extension}-priv"))
    }
}

#[async_trait]
impl WorkbookRepository for FileWorkbookRepository {
    async fn load(&self, path: &Path) -> Result<StoredWorkbook, RepositoryError> {
        let Some(workbook) = read_optional::<Workbook>(path).await? else {
            return Err(RepositoryError::NotFound(path.display().to_string()));
        };
        check_version(workbook.version)?;

        let private_path = Self::private_path(path);
        let private: Option<ParameterFile> = read_optional(&private_path).await?;
        if let Some(file) = &private {
            check_version(file.version)?;
        }

        let global: Option<ParameterFile> = match &self.global_path {
            Some(global_path) => read_optional(global_path).await?,
            None => None,
        };
        if let Some(file) = &global {
            check_version(file.version)?;
        }

        info!(
            path = %path.display(),
            private = private.is_some(),
            global = global.is_some(),
            "Loaded workbook files"
        );
        Ok(StoredWorkbook {
            workbook,
            private,
            global,
        })
    }

    async fn save(&self, path: &Path, files: &WorkbookFiles) -> Result<(), RepositoryError> {
        let content = to_json_stable_bytes(&files.workbook).map_err(serialization_error)?;
        fs::write(path, content).await?;

        write_parameters(&Self::private_path(path), &files.private).await?;

        match &self.global_path {
            Some(global_path) => write_parameters(global_path, &files.global).await?,
            None if !files.global.is_empty() => {
                warn!(path = %path.display(), "No global parameters file configured; global parameters not saved");
            }
            None => {}
        }

        info!(path = %path.display(), "Saved workbook files");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use workbench_domain::{Proxy, Request, Scenario};
    use workbench_domain::index::TreeNode;

    use super::*;

    fn files() -> WorkbookFiles {
        WorkbookFiles {
            workbook: Workbook {
                requests: vec![TreeNode::leaf(Request::new("r1").with_name("Ping").into())],
                ..Workbook::default()
            },
            private: ParameterFile {
                scenarios: vec![Scenario::new("s1", "Secrets")],
                ..ParameterFile::default()
            },
            global: ParameterFile {
                proxies: vec![Proxy::new("p1", "Corp", "http://corp:3128")],
                ..ParameterFile::default()
            },
        }
    }

    #[test]
    fn test_private_path() {
        assert_eq!(
            FileWorkbookRepository::private_path(Path::new("/tmp/api.workbench")),
            PathBuf::from("/tmp/api.workbench-priv")
        );
        assert_eq!(
            FileWorkbookRepository::private_path(Path::new("api.json")),
            PathBuf::from("api.json-priv")
        );
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("api.workbench");
        let global_path = dir.path().join("config").join("globals.json");
        let repo = FileWorkbookRepository::new().with_global_path(&global_path);

        repo.save(&path, &files()).await.unwrap();
        assert!(FileWorkbookRepository::private_path(&path).exists());
        assert!(global_path.exists());

        let stored = repo.load(&path).await.unwrap();
        assert_eq!(stored.workbook, files().workbook);
        assert_eq!(stored.private, Some(files().private));
        assert_eq!(stored.global, Some(files().global));
    }

    #[tokio::test]
    async fn test_empty_private_file_is_removed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("api.workbench");
        let repo = FileWorkbookRepository::new();
        repo.save(&path, &files()).await.unwrap();

        let mut without_private = files();
        without_private.private = ParameterFile::default();
        repo.save(&path, &without_private).await.unwrap();

        assert!(!FileWorkbookRepository::private_path(&path).exists());
        let stored = repo.load(&path).await.unwrap();
        assert_eq!(stored.private, None);
        assert_eq!(stored.global, None);
    }

    #[tokio::test]
    async fn test_load_missing_workbook() {
        let dir = TempDir::new().unwrap();
        let repo = FileWorkbookRepository::new();

        let result = repo.load(&dir.path().join("missing.workbench")).await;
        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_load_rejects_newer_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("api.workbench");
        tokio::fs::write(&path, r#"{"version": 99, "requests": []}"#).await.unwrap();

        let result = FileWorkbookRepository::new().load(&path).await;
        assert!(matches!(
            result,
            Err(RepositoryError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[tokio::test]
    async fn test_load_reports_malformed_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("api.workbench");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let result = FileWorkbookRepository::new().load(&path).await;
        assert!(matches!(result, Err(RepositoryError::Serialization(_))));
    }
}
