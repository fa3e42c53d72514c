//! File-based persistence adapters.

mod settings_repository;
mod workbook_repository;

pub use settings_repository::{SettingsError, SettingsRepository};
pub use workbook_repository::FileWorkbookRepository;
