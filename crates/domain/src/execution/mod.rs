//! Execution results and their aggregation.
//!
//! The engine returns an [`ExecutionBatch`]; the [`ExecutionTracker`] turns it
//! into a run menu, enriched per-result flags and per-run group summaries,
//! and tracks which run and result the user is looking at.

pub mod result;
pub mod state;
pub mod summary;
pub mod tracker;

pub use result::{
    ExecutedRequest, ExecutedResponse, ExecutionBatch, ExecutionBody, ExecutionResult, TestResult,
};
pub use state::{Execution, ExecutionStatus, ExecutionView, RunToken};
pub use summary::{
    Aggregation, EnrichedResult, GroupSummary, GroupSummaryRequest, InfoColor, RequestNames,
    ResultIndex, ResultKey, ResultMenuItem, RunMenuItem, RunTarget, aggregate,
};
pub use tracker::{
    CompletionOutcome, DEFAULT_LONG_TEXT_THRESHOLD, DEFAULT_PANEL, ExecutionSettings,
    ExecutionTracker,
};
