//! Workbench Domain - Core editor types
//!
//! This crate defines the domain model of the Workbench request editor:
//! ordered entity indices, the workbook catalog, inherited parameter
//! resolution and execution result aggregation.
//! All types here are pure Rust with no I/O dependencies.

pub mod entity;
pub mod error;
pub mod execution;
pub mod id;
pub mod index;
pub mod resolution;
pub mod settings;
pub mod workbook;
pub mod workspace;

pub use entity::{Entity, UNNAMED};
pub use error::{DomainError, DomainResult};
pub use execution::{
    CompletionOutcome, EnrichedResult, Execution, ExecutionBatch, ExecutionResult,
    ExecutionSettings, ExecutionStatus, ExecutionTracker, ExecutionView, GroupSummary, InfoColor,
    ResultIndex, ResultKey, RunMenuItem, RunTarget, RunToken, TestResult,
};
pub use id::{Id, IdGenerator, SequentialIdGenerator, UuidIdGenerator, generate_id};
pub use index::{IndexedEntities, NestedIndex, Position, TreeNode};
pub use resolution::{
    EffectiveParameters, ParameterLists, ResolvedParameter, SelectionOption, resolve_effective,
    resolve_inherited,
};
pub use settings::WorkbenchSettings;
pub use workbook::{
    Authorization, Certificate, GroupExecution, ParameterFile, ParameterKind, Persistence, Proxy,
    Request, RequestEntry, RequestGroup, Scenario, Selection, Selections, WORKBOOK_VERSION, Workbook,
    WorkbookFiles,
};
pub use workspace::{Workspace, WorkspaceSnapshot};
