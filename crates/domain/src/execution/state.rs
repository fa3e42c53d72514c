//! Execution state of a request or group.
//!
//! Each executable id moves through `Idle -> Running -> Completed`, back to
//! `Idle` on cancel. A new run clears the previous run's results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::summary::{EnrichedResult, GroupSummary, ResultIndex, ResultKey, RunMenuItem, RunTarget};

/// Identifies one `begin_run` of an execution.
///
/// Completions and engine failures carry the token of the run they belong
/// to, so a run that was cancelled and restarted ignores its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunToken(u64);

impl RunToken {
    /// Wraps a raw token value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw token value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

/// Lifecycle of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Nothing running; no results, or results discarded by a cancel.
    #[default]
    Idle,
    /// Waiting for the engine.
    Running,
    /// Results available.
    Completed,
}

impl ExecutionStatus {
    /// Returns true if the status is Idle.
    #[must_use]
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns true if a run is in progress.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns true if results are available.
    #[must_use]
    pub const fn is_completed(self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Execution state and derived results of one request or group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    /// Lifecycle state.
    pub status: ExecutionStatus,
    /// Token of the latest run.
    pub token: RunToken,
    /// What the latest run executes, fixed when it began.
    pub target: RunTarget,
    /// Whether the last completed run was a group run.
    pub is_group: bool,
    /// Result panel shown to the user.
    pub panel: String,
    /// Selected run.
    pub run_index: usize,
    /// Selected entry of the selected run's menu.
    pub result_index: ResultIndex,
    /// Run menu.
    pub runs: Vec<RunMenuItem>,
    /// Enriched results keyed by run and result index.
    pub results: BTreeMap<ResultKey, EnrichedResult>,
}

impl Execution {
    /// A fresh idle execution showing `panel`.
    #[must_use]
    pub fn idle(panel: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Idle,
            token: RunToken::default(),
            target: RunTarget::Request,
            is_group: false,
            panel: panel.into(),
            run_index: 0,
            result_index: ResultIndex::Result(0),
            runs: Vec::new(),
            results: BTreeMap::new(),
        }
    }

    /// Drops results and selection, keeping the panel.
    pub(crate) fn clear(&mut self) {
        self.runs.clear();
        self.results.clear();
        self.run_index = 0;
        self.result_index = ResultIndex::Result(0);
    }

    /// What the current selection points at.
    #[must_use]
    pub fn view(&self) -> ExecutionView<'_> {
        match self.status {
            ExecutionStatus::Idle => return ExecutionView::Idle,
            ExecutionStatus::Running => return ExecutionView::Running,
            ExecutionStatus::Completed => {}
        }
        let Some(run) = self.runs.get(self.run_index) else {
            return ExecutionView::NoResults;
        };
        match self.result_index {
            ResultIndex::Summary => run
                .group_summary
                .as_ref()
                .map_or(ExecutionView::NoResults, ExecutionView::Summary),
            ResultIndex::Result(result) => self
                .results
                .get(&ResultKey::new(self.run_index, result))
                .map_or(ExecutionView::NoResults, ExecutionView::Result),
        }
    }
}

/// The thing the result pane should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionView<'a> {
    /// Never ran, or the run was cancelled.
    Idle,
    /// A run is in progress.
    Running,
    /// The run completed without producing results.
    NoResults,
    /// The group summary of the selected run.
    Summary(&'a GroupSummary),
    /// One result.
    Result(&'a EnrichedResult),
}
