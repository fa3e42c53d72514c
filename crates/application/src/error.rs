//! Application error types

use thiserror::Error;
use workbench_domain::DomainError;

use crate::ports::{EngineError, RepositoryError};

/// Application-level errors.
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// A domain validation error occurred.
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    /// The execution engine failed.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// A storage operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A run is already in progress for this request or group.
    #[error("already running: {0}")]
    AlreadyRunning(String),

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,
}

/// Result type alias for application operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
