//! Aggregation of an execution batch into navigable summaries.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::result::{ExecutionBatch, ExecutionResult, TestResult};
use crate::error::DomainError;
use crate::workbook::GroupExecution;

/// Status color of a result or group summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InfoColor {
    /// Completed and every test passed.
    Success,
    /// Completed but at least one test failed.
    Warning,
    /// Did not complete.
    Error,
}

impl InfoColor {
    /// Color for a completion flag and the test outcome.
    #[must_use]
    pub const fn from_outcome(success: bool, all_tests_passed: bool) -> Self {
        match (success, all_tests_passed) {
            (false, _) => Self::Error,
            (true, true) => Self::Success,
            (true, false) => Self::Warning,
        }
    }

    /// Color for a single result.
    #[must_use]
    pub fn for_result(result: &ExecutionResult) -> Self {
        Self::from_outcome(result.success, result.failed_tests() == 0)
    }
}

/// Position of an entry in a run's result menu.
///
/// Serialized as an integer, `-1` standing for the group summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum ResultIndex {
    /// The synthetic group summary entry.
    Summary,
    /// The n-th result of the run.
    Result(usize),
}

impl From<ResultIndex> for i64 {
    fn from(index: ResultIndex) -> Self {
        match index {
            ResultIndex::Summary => -1,
            ResultIndex::Result(n) => Self::try_from(n).unwrap_or(Self::MAX),
        }
    }
}

impl TryFrom<i64> for ResultIndex {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::Summary),
            n => usize::try_from(n)
                .map(Self::Result)
                .map_err(|_| format!("invalid result index: {n}")),
        }
    }
}

impl fmt::Display for ResultIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", i64::from(*self))
    }
}

/// Address of a result: `<run>-<result>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ResultKey {
    /// Run index.
    pub run: usize,
    /// Result index within the run.
    pub result: usize,
}

impl ResultKey {
    /// Creates a key.
    #[must_use]
    pub const fn new(run: usize, result: usize) -> Self {
        Self { run, result }
    }
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.run, self.result)
    }
}

impl FromStr for ResultKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::InvalidSelection(format!("malformed result key: {s}"));
        let (run, result) = s.split_once('-').ok_or_else(invalid)?;
        Ok(Self {
            run: run.parse().map_err(|_| invalid())?,
            result: result.parse().map_err(|_| invalid())?,
        })
    }
}

impl From<ResultKey> for String {
    fn from(key: ResultKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for ResultKey {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A result with the display flags derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedResult {
    /// The raw result.
    #[serde(flatten)]
    pub result: ExecutionResult,
    /// Whether the sent request was captured.
    pub has_request: bool,
    /// Panels other than the info panel are pointless for failed results.
    pub disable_other_panels: bool,
    /// Whether the response text is too long to render inline.
    pub long_text_in_response: bool,
    /// Status color.
    pub info_color: InfoColor,
}

impl EnrichedResult {
    /// Derives the display flags of a result.
    #[must_use]
    pub fn new(result: ExecutionResult, long_text_threshold: usize) -> Self {
        Self {
            has_request: result.request.is_some(),
            disable_other_panels: !result.success,
            long_text_in_response: result.response_text_len() > long_text_threshold,
            info_color: InfoColor::for_result(&result),
            result,
        }
    }
}

/// An entry of a run's result menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMenuItem {
    /// Request title, or `Summary` for the group summary.
    pub title: String,
    /// Menu position.
    pub index: ResultIndex,
}

/// One request's line in a group summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummaryRequest {
    /// Request title.
    pub request_name: String,
    /// HTTP status, if a response was received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// HTTP status text, if a response was received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    /// Duration in milliseconds.
    pub milliseconds: u64,
    /// Test outcomes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests: Option<Vec<TestResult>>,
    /// Error when the request could not complete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Summary of one run of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    /// Earliest start time of the run's results.
    pub executed_at: u64,
    /// Total duration: summed for sequential groups, the longest result for
    /// concurrent ones.
    pub milliseconds: u64,
    /// Whether every request completed.
    pub success: bool,
    /// Whether every test of every request passed.
    pub all_tests_succeeded: bool,
    /// Status color.
    pub info_color: InfoColor,
    /// Per-request lines in result order.
    pub requests: Vec<GroupSummaryRequest>,
}

impl GroupSummary {
    /// Summarizes a non-empty run; returns `None` for an empty one.
    #[must_use]
    pub fn from_run<N: RequestNames + ?Sized>(
        results: &[ExecutionResult],
        execution: GroupExecution,
        names: &N,
    ) -> Option<Self> {
        let executed_at = results.iter().map(|r| r.executed_at).min()?;
        let durations = results.iter().map(|r| r.milliseconds);
        let milliseconds = match execution {
            GroupExecution::Sequential => durations.fold(0, u64::saturating_add),
            GroupExecution::Concurrent => durations.max().unwrap_or_default(),
        };
        let success = results.iter().all(|r| r.success);
        let all_tests_succeeded = results.iter().all(ExecutionResult::all_tests_passed);

        let requests = results
            .iter()
            .map(|r| GroupSummaryRequest {
                request_name: names.request_title(&r.request_id),
                status: r.response.as_ref().map(|resp| resp.status),
                status_text: r.response.as_ref().map(|resp| resp.status_text.clone()),
                milliseconds: r.milliseconds,
                tests: r.tests.clone(),
                error_message: r.error_message.clone(),
            })
            .collect();

        Some(Self {
            executed_at,
            milliseconds,
            success,
            all_tests_succeeded,
            info_color: InfoColor::from_outcome(success, all_tests_succeeded),
            requests,
        })
    }
}

/// One run in the run menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMenuItem {
    /// `Run <n> of <total>`.
    pub title: String,
    /// Result entries; the summary entry comes first when present.
    pub results: Vec<ResultMenuItem>,
    /// Summary of the run, for group executions with at least one result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_summary: Option<GroupSummary>,
}

impl RunMenuItem {
    /// Returns true if the menu has a summary entry.
    #[must_use]
    pub fn has_summary_entry(&self) -> bool {
        self.results.first().is_some_and(|r| r.index == ResultIndex::Summary)
    }

    /// Menu position selected when the run is first shown.
    #[must_use]
    pub fn default_index(&self) -> ResultIndex {
        if self.has_summary_entry() {
            ResultIndex::Summary
        } else {
            ResultIndex::Result(0)
        }
    }

    /// Returns true if `index` is one of the menu's entries.
    #[must_use]
    pub fn contains(&self, index: ResultIndex) -> bool {
        self.results.iter().any(|r| r.index == index)
    }
}

/// Display names for request ids.
pub trait RequestNames {
    /// Title of the request, `(Unnamed)` when it has no name or is unknown.
    fn request_title(&self, request_id: &str) -> String;
}

/// What was executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "target", content = "execution", rename_all = "camelCase")]
pub enum RunTarget {
    /// A single request.
    Request,
    /// A group, running its children sequentially or concurrently.
    Group(GroupExecution),
}

/// Derived structures of a completed execution.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Aggregation {
    /// Run menu.
    pub runs: Vec<RunMenuItem>,
    /// Enriched results keyed by run and result index.
    pub results: BTreeMap<ResultKey, EnrichedResult>,
    /// Whether every result completed and every test passed.
    pub all_succeeded: bool,
}

/// Reduces a batch into the run menu, the result map and group summaries.
#[must_use]
pub fn aggregate<N: RequestNames + ?Sized>(
    batch: &ExecutionBatch,
    target: RunTarget,
    names: &N,
    long_text_threshold: usize,
) -> Aggregation {
    let total = batch.len();
    let mut aggregation = Aggregation {
        all_succeeded: true,
        ..Aggregation::default()
    };

    for (run_index, run) in batch.runs().iter().enumerate() {
        let mut results = Vec::with_capacity(run.len() + 1);
        if run.len() > 1 {
            results.push(ResultMenuItem {
                title: "Summary".to_string(),
                index: ResultIndex::Summary,
            });
        }

        for (result_index, result) in run.iter().enumerate() {
            aggregation.all_succeeded &= result.success && result.all_tests_passed();
            results.push(ResultMenuItem {
                title: names.request_title(&result.request_id),
                index: ResultIndex::Result(result_index),
            });
            aggregation.results.insert(
                ResultKey::new(run_index, result_index),
                EnrichedResult::new(result.clone(), long_text_threshold),
            );
        }

        let group_summary = match target {
            RunTarget::Group(execution) => GroupSummary::from_run(run, execution, names),
            RunTarget::Request => None,
        };

        aggregation.runs.push(RunMenuItem {
            title: format!("Run {} of {total}", run_index + 1),
            results,
            group_summary,
        });
    }
    aggregation
}
