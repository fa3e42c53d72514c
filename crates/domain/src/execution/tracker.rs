//! Per-id execution state machine and result navigation.

use std::collections::HashMap;

use super::result::ExecutionBatch;
use super::state::{Execution, ExecutionStatus, ExecutionView, RunToken};
use super::summary::{EnrichedResult, GroupSummary, RequestNames, ResultIndex, ResultKey, RunTarget, aggregate};
use crate::entity::{Entity, UNNAMED};
use crate::error::{DomainError, DomainResult};
use crate::id::Id;
use crate::index::NestedIndex;
use crate::workbook::RequestEntry;

/// Panel shown after a run unless the previous one is kept.
pub const DEFAULT_PANEL: &str = "Info";

/// Response text longer than this is not rendered inline.
pub const DEFAULT_LONG_TEXT_THRESHOLD: usize = 2 * 1024 * 1024;

/// Knobs of the aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionSettings {
    /// Response text length above which results are flagged as long.
    pub long_text_threshold: usize,
    /// Panel selected after failed or group runs.
    pub default_panel: String,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            long_text_threshold: DEFAULT_LONG_TEXT_THRESHOLD,
            default_panel: DEFAULT_PANEL.to_string(),
        }
    }
}

/// Whether a completion was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Results were stored.
    Applied,
    /// The id was not running the run the results belong to (never
    /// started, cancelled, or restarted since); nothing changed.
    Ignored,
}

impl RequestNames for NestedIndex<RequestEntry> {
    fn request_title(&self, request_id: &str) -> String {
        self.find(request_id)
            .map_or(UNNAMED, Entity::title)
            .to_string()
    }
}

/// Execution state of every request and group that has been run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionTracker {
    executions: HashMap<Id, Execution>,
    settings: ExecutionSettings,
    next_token: u64,
}

impl ExecutionTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new(settings: ExecutionSettings) -> Self {
        Self {
            executions: HashMap::new(),
            settings,
            next_token: 0,
        }
    }

    /// Execution of `id`, if it was ever run.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Execution> {
        self.executions.get(id)
    }

    /// Lifecycle state of `id`; `Idle` if it was never run.
    #[must_use]
    pub fn status(&self, id: &str) -> ExecutionStatus {
        self.executions
            .get(id)
            .map_or(ExecutionStatus::Idle, |e| e.status)
    }

    /// Returns true if `id` is waiting for the engine.
    #[must_use]
    pub fn is_running(&self, id: &str) -> bool {
        self.status(id).is_running()
    }

    /// Marks `id` as running `target` and discards its previous results.
    ///
    /// Returns the token the run's completion must present.
    pub fn begin_run(&mut self, id: &str, target: RunTarget) -> RunToken {
        self.next_token += 1;
        let token = RunToken::new(self.next_token);
        let default_panel = &self.settings.default_panel;
        let execution = self
            .executions
            .entry(id.to_string())
            .or_insert_with(|| Execution::idle(default_panel.clone()));
        execution.clear();
        execution.status = ExecutionStatus::Running;
        execution.token = token;
        execution.target = target;
        token
    }

    /// Returns `id` to idle if it is running, whichever run that is.
    /// Returns true if it was.
    pub fn cancel(&mut self, id: &str) -> bool {
        match self.executions.get_mut(id) {
            Some(execution) if execution.status.is_running() => {
                execution.clear();
                execution.status = ExecutionStatus::Idle;
                true
            }
            _ => false,
        }
    }

    /// Returns `id` to idle only if the run identified by `token` is still
    /// the one in progress. Returns true if it was.
    pub fn cancel_run(&mut self, id: &str, token: RunToken) -> bool {
        if !self.is_current(id, token) {
            return false;
        }
        self.cancel(id)
    }

    /// Stores the results of the run of `id` identified by `token`.
    ///
    /// Results are aggregated for the target recorded by
    /// [`ExecutionTracker::begin_run`]. A completion for an id that is not
    /// running, or for a run other than the current one, is ignored.
    ///
    /// The previous panel is kept only after a single-request run in which
    /// every result completed and every test passed. The first run is
    /// selected, on its summary entry when it has one.
    pub fn complete<N: RequestNames + ?Sized>(
        &mut self,
        id: &str,
        token: RunToken,
        batch: &ExecutionBatch,
        names: &N,
    ) -> CompletionOutcome {
        if !self.is_current(id, token) {
            return CompletionOutcome::Ignored;
        }
        let Some(execution) = self.executions.get_mut(id) else {
            return CompletionOutcome::Ignored;
        };

        let target = execution.target;
        let aggregation = aggregate(batch, target, names, self.settings.long_text_threshold);
        let is_group = matches!(target, RunTarget::Group(_));
        if is_group || !aggregation.all_succeeded {
            execution.panel.clone_from(&self.settings.default_panel);
        }

        execution.result_index = aggregation
            .runs
            .first()
            .map_or(ResultIndex::Result(0), |run| run.default_index());
        execution.run_index = 0;
        execution.runs = aggregation.runs;
        execution.results = aggregation.results;
        execution.is_group = is_group;
        execution.status = ExecutionStatus::Completed;
        CompletionOutcome::Applied
    }

    /// Returns true if `token` identifies the run of `id` in progress.
    fn is_current(&self, id: &str, token: RunToken) -> bool {
        self.executions
            .get(id)
            .is_some_and(|e| e.status.is_running() && e.token == token)
    }

    /// Forgets everything about `id`.
    pub fn remove(&mut self, id: &str) -> Option<Execution> {
        self.executions.remove(id)
    }

    /// Shows another result panel.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `id` was never run.
    pub fn change_panel(&mut self, id: &str, panel: impl Into<String>) -> DomainResult<()> {
        self.execution_mut(id)?.panel = panel.into();
        Ok(())
    }

    /// Selects another run, on its default menu entry.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `id` was never run and `InvalidSelection` if the
    /// run does not exist.
    pub fn change_run_index(&mut self, id: &str, run_index: usize) -> DomainResult<()> {
        let execution = self.execution_mut(id)?;
        let run = execution.runs.get(run_index).ok_or_else(|| {
            DomainError::InvalidSelection(format!("run {run_index} of {id}"))
        })?;
        execution.result_index = run.default_index();
        execution.run_index = run_index;
        Ok(())
    }

    /// Selects another entry of the current run's menu.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `id` was never run and `InvalidSelection` if the
    /// menu has no such entry.
    pub fn change_result_index(&mut self, id: &str, result_index: ResultIndex) -> DomainResult<()> {
        let execution = self.execution_mut(id)?;
        let valid = execution
            .runs
            .get(execution.run_index)
            .is_some_and(|run| run.contains(result_index));
        if !valid {
            return Err(DomainError::InvalidSelection(format!(
                "result {result_index} of run {} of {id}",
                execution.run_index
            )));
        }
        execution.result_index = result_index;
        Ok(())
    }

    /// Group summary of one run.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `id` was never run and `InvalidSelection` if the
    /// run does not exist or has no summary.
    pub fn group_summary(&self, id: &str, run_index: usize) -> DomainResult<&GroupSummary> {
        self.execution(id)?
            .runs
            .get(run_index)
            .and_then(|run| run.group_summary.as_ref())
            .ok_or_else(|| DomainError::InvalidSelection(format!("summary of run {run_index} of {id}")))
    }

    /// One enriched result.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `id` was never run and `InvalidSelection` if the
    /// result does not exist.
    pub fn result(&self, id: &str, run_index: usize, result_index: usize) -> DomainResult<&EnrichedResult> {
        let key = ResultKey::new(run_index, result_index);
        self.execution(id)?
            .results
            .get(&key)
            .ok_or_else(|| DomainError::InvalidSelection(format!("result {key} of {id}")))
    }

    /// What the result pane of `id` should show; `Idle` if it was never run.
    #[must_use]
    pub fn view(&self, id: &str) -> ExecutionView<'_> {
        self.executions
            .get(id)
            .map_or(ExecutionView::Idle, Execution::view)
    }

    fn execution(&self, id: &str) -> DomainResult<&Execution> {
        self.executions
            .get(id)
            .ok_or_else(|| DomainError::NotFound(id.to_string()))
    }

    fn execution_mut(&mut self, id: &str) -> DomainResult<&mut Execution> {
        self.executions
            .get_mut(id)
            .ok_or_else(|| DomainError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::execution::result::{ExecutionResult, TestResult};
    use crate::workbook::{GroupExecution, Request, RequestGroup};

    fn tree() -> NestedIndex<RequestEntry> {
        let mut index = NestedIndex::new();
        index
            .insert(RequestGroup::new("g").with_name("Group").into(), None, None)
            .unwrap();
        index
            .insert(Request::new("a").with_name("Alpha").into(), Some("g"), None)
            .unwrap();
        index.insert(Request::new("b").into(), Some("g"), None).unwrap();
        index
    }

    fn group_batch() -> ExecutionBatch {
        ExecutionBatch::new(vec![
            vec![ExecutionResult::new("a", 0, 10), ExecutionResult::new("b", 5, 20)],
            vec![ExecutionResult::new("a", 40, 10), ExecutionResult::new("b", 45, 20)],
        ])
    }

    const GROUP: RunTarget = RunTarget::Group(GroupExecution::Sequential);

    #[test]
    fn test_lifecycle() {
        let mut tracker = ExecutionTracker::default();
        assert_eq!(tracker.status("g"), ExecutionStatus::Idle);

        let token = tracker.begin_run("g", GROUP);
        assert!(tracker.is_running("g"));
        assert_eq!(tracker.view("g"), ExecutionView::Running);

        let outcome = tracker.complete("g", token, &group_batch(), &tree());
        assert_eq!(outcome, CompletionOutcome::Applied);
        assert_eq!(tracker.status("g"), ExecutionStatus::Completed);

        let execution = tracker.get("g").unwrap();
        assert_eq!(execution.run_index, 0);
        assert_eq!(execution.result_index, ResultIndex::Summary);
        assert_eq!(execution.runs[0].results[1].title, "Alpha");
        assert_eq!(execution.runs[0].results[2].title, "(Unnamed)");
        assert!(matches!(tracker.view("g"), ExecutionView::Summary(_)));

        tracker.begin_run("g", GROUP);
        assert!(tracker.get("g").unwrap().results.is_empty());
    }

    #[test]
    fn test_late_completion_after_cancel_is_ignored() {
        let mut tracker = ExecutionTracker::default();
        let token = tracker.begin_run("g", GROUP);
        assert!(tracker.cancel("g"));
        assert!(!tracker.cancel("g"));

        let outcome = tracker.complete("g", token, &group_batch(), &tree());
        assert_eq!(outcome, CompletionOutcome::Ignored);
        assert_eq!(tracker.status("g"), ExecutionStatus::Idle);
        assert_eq!(tracker.view("g"), ExecutionView::Idle);
    }

    #[test]
    fn test_completion_without_begin_is_ignored() {
        let mut tracker = ExecutionTracker::default();
        let outcome = tracker.complete("a", RunToken::new(1), &group_batch(), &tree());
        assert_eq!(outcome, CompletionOutcome::Ignored);
        assert!(tracker.get("a").is_none());
    }

    #[test]
    fn test_zero_results_show_no_results() {
        let mut tracker = ExecutionTracker::default();
        let token = tracker.begin_run("g", GROUP);
        tracker.complete("g", token, &ExecutionBatch::new(vec![Vec::new()]), &tree());

        let execution = tracker.get("g").unwrap();
        assert_eq!(execution.result_index, ResultIndex::Result(0));
        assert_eq!(tracker.view("g"), ExecutionView::NoResults);

        let token = tracker.begin_run("g", GROUP);
        tracker.complete("g", token, &ExecutionBatch::default(), &tree());
        assert_eq!(tracker.view("g"), ExecutionView::NoResults);
    }

    #[test]
    fn test_panel_kept_after_clean_request_run() {
        let mut tracker = ExecutionTracker::default();
        let clean = ExecutionBatch::new(vec![vec![
            ExecutionResult::new("a", 0, 1).with_tests(vec![TestResult::passed("ok")]),
        ]]);

        let token = tracker.begin_run("a", RunTarget::Request);
        tracker.complete("a", token, &clean, &tree());
        tracker.change_panel("a", "Headers").unwrap();

        let token = tracker.begin_run("a", RunTarget::Request);
        tracker.complete("a", token, &clean, &tree());
        assert_eq!(tracker.get("a").unwrap().panel, "Headers");

        let failing = ExecutionBatch::new(vec![vec![
            ExecutionResult::new("a", 0, 1).with_tests(vec![TestResult::failed("ok", "no")]),
        ]]);
        let token = tracker.begin_run("a", RunTarget::Request);
        tracker.complete("a", token, &failing, &tree());
        assert_eq!(tracker.get("a").unwrap().panel, DEFAULT_PANEL);
    }

    #[test]
    fn test_panel_reset_after_group_run() {
        let mut tracker = ExecutionTracker::default();
        let token = tracker.begin_run("g", GROUP);
        tracker.change_panel("g", "Response").unwrap();
        tracker.complete("g", token, &group_batch(), &tree());
        assert_eq!(tracker.get("g").unwrap().panel, DEFAULT_PANEL);
    }

    #[test]
    fn test_navigation() {
        let mut tracker = ExecutionTracker::default();
        let token = tracker.begin_run("g", GROUP);
        tracker.complete("g", token, &group_batch(), &tree());

        tracker.change_run_index("g", 1).unwrap();
        tracker.change_result_index("g", ResultIndex::Result(1)).unwrap();
        let ExecutionView::Result(result) = tracker.view("g") else {
            panic!("expected a result view");
        };
        assert_eq!(result.result.executed_at, 45);

        assert!(matches!(
            tracker.change_run_index("g", 2),
            Err(DomainError::InvalidSelection(_))
        ));
        assert!(matches!(
            tracker.change_result_index("g", ResultIndex::Result(2)),
            Err(DomainError::InvalidSelection(_))
        ));
        assert!(matches!(
            tracker.change_panel("nope", "Info"),
            Err(DomainError::NotFound(_))
        ));

        assert_eq!(tracker.group_summary("g", 1).unwrap().milliseconds, 30);
        assert_eq!(tracker.result("g", 0, 1).unwrap().result.request_id, "b");
        assert!(tracker.result("g", 0, 2).is_err());
    }

    #[test]
    fn test_remove() {
        let mut tracker = ExecutionTracker::default();
        tracker.begin_run("a", RunTarget::Request);
        assert!(tracker.remove("a").is_some());
        assert!(tracker.get("a").is_none());
        assert!(tracker.remove("a").is_none());
    }

    #[test]
    fn test_completion_of_superseded_run_is_ignored() {
        let mut tracker = ExecutionTracker::default();
        let first = tracker.begin_run("g", GROUP);
        assert!(tracker.cancel("g"));
        let second = tracker.begin_run("g", GROUP);
        assert_ne!(first, second);

        let stale = ExecutionBatch::new(vec![vec![ExecutionResult::new("a", 0, 111)]]);
        assert_eq!(tracker.complete("g", first, &stale, &tree()), CompletionOutcome::Ignored);
        assert!(!tracker.cancel_run("g", first));
        assert!(tracker.is_running("g"));

        let fresh = ExecutionBatch::new(vec![vec![ExecutionResult::new("a", 0, 222)]]);
        assert_eq!(tracker.complete("g", second, &fresh, &tree()), CompletionOutcome::Applied);
        assert_eq!(tracker.result("g", 0, 0).unwrap().result.milliseconds, 222);
    }

    #[test]
    fn test_cancel_run_requires_current_token() {
        let mut tracker = ExecutionTracker::default();
        let token = tracker.begin_run("a", RunTarget::Request);
        assert!(!tracker.cancel_run("a", RunToken::new(token.value() + 1)));
        assert!(tracker.is_running("a"));
        assert!(tracker.cancel_run("a", token));
        assert_eq!(tracker.status("a"), ExecutionStatus::Idle);
    }

    #[test]
    fn test_completion_uses_target_recorded_at_begin() {
        let mut tracker = ExecutionTracker::default();
        let batch = ExecutionBatch::new(vec![vec![
            ExecutionResult::new("a", 0, 100),
            ExecutionResult::new("b", 5, 250),
        ]]);

        let token = tracker.begin_run("g", RunTarget::Group(GroupExecution::Sequential));
        tracker.complete("g", token, &batch, &tree());
        assert_eq!(tracker.group_summary("g", 0).unwrap().milliseconds, 350);

        let token = tracker.begin_run("g", RunTarget::Group(GroupExecution::Concurrent));
        tracker.complete("g", token, &batch, &tree());
        assert_eq!(tracker.group_summary("g", 0).unwrap().milliseconds, 250);
    }
}
