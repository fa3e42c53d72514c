//! Workbench Application - Use cases and ports
//!
//! This crate orchestrates the domain model: the [`WorkspaceSession`] owns an
//! open workspace, use cases drive the execution engine and the workbook
//! repository through the ports defined here.

pub mod error;
pub mod ports;
pub mod session;
pub mod use_cases;

pub use error::{ApplicationError, ApplicationResult};
pub use session::{SharedSession, WorkspaceSession};
