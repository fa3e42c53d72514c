//! Save workbook use case

use std::path::Path;

use tracing::info;

use crate::error::ApplicationResult;
use crate::ports::WorkbookRepository;
use crate::session::WorkspaceSession;

/// Saves the workspace of a session, split by parameter persistence.
pub struct SaveWorkbook<R> {
    repository: R,
}

impl<R: WorkbookRepository> SaveWorkbook<R> {
    /// Creates a new `SaveWorkbook` use case.
    pub const fn new(repository: R) -> Self {
        Self { repository }
    }

    /// Writes the workbook, private and global files and marks the session
    /// clean.
    ///
    /// # Errors
    /// Returns an error if a file cannot be written; the session stays dirty.
    pub async fn execute(&self, session: &mut WorkspaceSession, path: &Path) -> ApplicationResult<()> {
        let files = session.workspace().to_files();
        self.repository.save(path, &files).await?;
        session.mark_clean();
        info!(path = %path.display(), "Saved workbook");
        Ok(())
    }
}
