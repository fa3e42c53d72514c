//! Use cases
//!
//! Each use case orchestrates ports and the workspace session for one user
//! action.

mod execute_run;
mod open_workbook;
mod save_workbook;

pub use execute_run::ExecuteRun;
pub use open_workbook::{OpenWorkbook, OpenedWorkbook};
pub use save_workbook::SaveWorkbook;
