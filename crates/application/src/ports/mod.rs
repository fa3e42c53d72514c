//! Port definitions (interfaces)
//!
//! Ports define the boundaries between the application core and external systems.
//! Each port is a trait that can be implemented by adapters in the infrastructure layer.

mod execution_engine;
mod workbook_repository;

pub use execution_engine::{
    CancellationReceiver, CancellationToken, EngineError, ExecutionEngine, RunCommand,
};
pub use workbook_repository::{RepositoryError, StoredWorkbook, WorkbookRepository};
