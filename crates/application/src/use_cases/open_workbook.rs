//! Open workbook use case

use std::path::Path;

use tracing::{info, warn};
use workbench_domain::Workspace;

use crate::error::ApplicationResult;
use crate::ports::WorkbookRepository;

/// Output containing the opened workspace.
#[derive(Debug)]
pub struct OpenedWorkbook {
    /// The merged workspace.
    pub workspace: Workspace,
    /// Selections that could not be matched and were reset.
    pub warnings: Vec<String>,
}

/// Loads a workbook with its private and global parameters.
pub struct OpenWorkbook<R> {
    repository: R,
}

impl<R: WorkbookRepository> OpenWorkbook<R> {
    /// Creates a new `OpenWorkbook` use case.
    pub const fn new(repository: R) -> Self {
        Self { repository }
    }

    /// Executes the use case.
    ///
    /// Parameters are merged global first, then private, then workbook.
    /// Selections are then checked: name-only matches are repointed, and
    /// unmatched selections are reset and reported as warnings.
    ///
    /// # Errors
    /// Returns an error if the files cannot be read or the request tree is
    /// malformed.
    pub async fn execute(&self, path: &Path) -> ApplicationResult<OpenedWorkbook> {
        let stored = self.repository.load(path).await?;
        let mut workspace = Workspace::from_files(stored.workbook, stored.private, stored.global)?;
        let warnings = workspace.validate_selections();
        for warning in &warnings {
            warn!(path = %path.display(), "{warning}");
        }
        info!(
            path = %path.display(),
            requests = workspace.requests.len(),
            warnings = warnings.len(),
            "Opened workbook"
        );
        Ok(OpenedWorkbook { workspace, warnings })
    }
}
