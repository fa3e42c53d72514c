//! Raw execution results as produced by the execution engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::Id;

/// A request or response body as captured by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionBody {
    /// Raw bytes, base64 on the wire.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_bytes"
    )]
    pub data: Option<Vec<u8>>,
    /// Decoded text, when the body is textual.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ExecutionBody {
    /// A textual body.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            data: Some(text.clone().into_bytes()),
            text: Some(text),
        }
    }
}

mod optional_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|encoded| STANDARD.decode(encoded.as_bytes()))
            .transpose()
            .map_err(serde::de::Error::custom)
    }
}

/// The request as it was actually sent, after variable substitution.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutedRequest {
    /// Final URL.
    pub url: String,
    /// Method.
    pub method: String,
    /// Headers sent.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Body sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<ExecutionBody>,
    /// Variables in effect.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,
}

/// The response received.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutedResponse {
    /// HTTP status code.
    pub status: u16,
    /// HTTP status text.
    #[serde(default)]
    pub status_text: String,
    /// Response headers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    /// Response body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<ExecutionBody>,
    /// Whether an OAuth2 token came from the cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token_cached: Option<bool>,
}

/// Outcome of one test case of a request's test script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// Test name, one element per nesting level of `describe`/`it` blocks.
    pub test_name: Vec<String>,
    /// Whether the test passed.
    pub success: bool,
    /// Failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Console output captured while the test ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<Vec<String>>,
}

impl TestResult {
    /// A passing test.
    #[must_use]
    pub fn passed(name: impl Into<String>) -> Self {
        Self {
            test_name: vec![name.into()],
            success: true,
            error: None,
            logs: None,
        }
    }

    /// A failing test.
    #[must_use]
    pub fn failed(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            test_name: vec![name.into()],
            success: false,
            error: Some(error.into()),
            logs: None,
        }
    }
}

const fn default_total_runs() -> u32 {
    1
}

/// The result of executing one request once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// Id of the request that ran.
    pub request_id: Id,
    /// Zero-based run index.
    #[serde(default)]
    pub run: u32,
    /// Total runs of the execution.
    #[serde(default = "default_total_runs")]
    pub total_runs: u32,
    /// What was sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<ExecutedRequest>,
    /// What came back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ExecutedResponse>,
    /// Test outcomes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests: Option<Vec<TestResult>>,
    /// Start time in milliseconds since the Unix epoch.
    pub executed_at: u64,
    /// Duration in milliseconds.
    pub milliseconds: u64,
    /// Whether the request completed (regardless of test outcomes).
    pub success: bool,
    /// Number of tests run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_count: Option<usize>,
    /// Number of tests that failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_test_count: Option<usize>,
    /// Error when the request could not complete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ExecutionResult {
    /// A successful result with no payload.
    #[must_use]
    pub fn new(request_id: impl Into<Id>, executed_at: u64, milliseconds: u64) -> Self {
        Self {
            request_id: request_id.into(),
            run: 0,
            total_runs: 1,
            request: None,
            response: None,
            tests: None,
            executed_at,
            milliseconds,
            success: true,
            test_count: None,
            failed_test_count: None,
            error_message: None,
        }
    }

    /// Sets the run index and run count.
    #[must_use]
    pub const fn with_run(mut self, run: u32, total_runs: u32) -> Self {
        self.run = run;
        self.total_runs = total_runs;
        self
    }

    /// Sets the sent request.
    #[must_use]
    pub fn with_request(mut self, request: ExecutedRequest) -> Self {
        self.request = Some(request);
        self
    }

    /// Sets the response.
    #[must_use]
    pub fn with_response(mut self, response: ExecutedResponse) -> Self {
        self.response = Some(response);
        self
    }

    /// Sets the test outcomes and the derived counts.
    #[must_use]
    pub fn with_tests(mut self, tests: Vec<TestResult>) -> Self {
        self.test_count = Some(tests.len());
        self.failed_test_count = Some(tests.iter().filter(|t| !t.success).count());
        self.tests = Some(tests);
        self
    }

    /// Marks the result as failed with an error.
    #[must_use]
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.success = false;
        self.error_message = Some(message.into());
        self
    }

    /// Number of failed tests, counted from the test list when the engine
    /// did not report it.
    #[must_use]
    pub fn failed_tests(&self) -> usize {
        self.failed_test_count.unwrap_or_else(|| {
            self.tests
                .as_ref()
                .map_or(0, |tests| tests.iter().filter(|t| !t.success).count())
        })
    }

    /// Returns true if every test passed (vacuously true without tests).
    #[must_use]
    pub fn all_tests_passed(&self) -> bool {
        self.failed_tests() == 0
            && self
                .tests
                .as_ref()
                .is_none_or(|tests| tests.iter().all(|t| t.success))
    }

    /// Response headers, if a response was received.
    #[must_use]
    pub fn response_headers(&self) -> Option<&BTreeMap<String, String>> {
        self.response.as_ref()?.headers.as_ref()
    }

    /// Response body, if a response with a body was received.
    #[must_use]
    pub fn response_body(&self) -> Option<&ExecutionBody> {
        self.response.as_ref()?.body.as_ref()
    }

    /// Length of the response body text, zero without one.
    #[must_use]
    pub fn response_text_len(&self) -> usize {
        self.response_body()
            .and_then(|body| body.text.as_ref())
            .map_or(0, String::len)
    }
}

/// Results of one execution: one list per run, each list in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionBatch {
    runs: Vec<Vec<ExecutionResult>>,
}

impl ExecutionBatch {
    /// Wraps results already grouped per run.
    #[must_use]
    pub const fn new(runs: Vec<Vec<ExecutionResult>>) -> Self {
        Self { runs }
    }

    /// Groups a flat result list into `total_runs` runs, ordering each run
    /// by start time.
    ///
    /// Runs without any result are kept as empty lists.
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` if a result belongs to a run at or past
    /// `total_runs`.
    pub fn from_results(mut results: Vec<ExecutionResult>, total_runs: u32) -> DomainResult<Self> {
        if let Some(result) = results.iter().find(|r| r.run >= total_runs) {
            return Err(DomainError::InvalidValue(format!(
                "result of {} is in run {} of {total_runs}",
                result.request_id, result.run
            )));
        }
        results.sort_by_key(|r| (r.run, r.executed_at));
        let mut runs: Vec<Vec<ExecutionResult>> = (0..total_runs).map(|_| Vec::new()).collect();
        for result in results {
            runs[result.run as usize].push(result);
        }
        Ok(Self { runs })
    }

    /// Per-run results.
    #[must_use]
    pub fn runs(&self) -> &[Vec<ExecutionResult>] {
        &self.runs
    }

    /// Number of runs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Returns true if the batch has no run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_from_results_buckets_and_orders() {
        let results = vec![
            ExecutionResult::new("b", 20, 5).with_run(1, 2),
            ExecutionResult::new("a", 30, 5).with_run(0, 2),
            ExecutionResult::new("c", 10, 5).with_run(0, 2),
            ExecutionResult::new("d", 5, 5).with_run(1, 2),
        ];
        let batch = ExecutionBatch::from_results(results, 2).unwrap();

        let ids: Vec<Vec<&str>> = batch
            .runs()
            .iter()
            .map(|run| run.iter().map(|r| r.request_id.as_str()).collect())
            .collect();
        assert_eq!(ids, vec![vec!["c", "a"], vec!["d", "b"]]);
    }

    #[test]
    fn test_from_results_keeps_empty_runs() {
        let results = vec![ExecutionResult::new("a", 0, 1).with_run(1, 4)];
        let batch = ExecutionBatch::from_results(results, 4).unwrap();
        assert_eq!(batch.len(), 4);
        assert!(batch.runs()[0].is_empty());
        assert_eq!(batch.runs()[1].len(), 1);
        assert!(batch.runs()[2].is_empty());
        assert!(batch.runs()[3].is_empty());

        assert_eq!(ExecutionBatch::from_results(Vec::new(), 2).unwrap().len(), 2);
    }

    #[test]
    fn test_from_results_rejects_run_out_of_range() {
        let result = ExecutionBatch::from_results(
            vec![
                ExecutionResult::new("a", 0, 1),
                ExecutionResult::new("b", 0, 1).with_run(u32::MAX, 1),
            ],
            1,
        );
        assert!(matches!(result, Err(DomainError::InvalidValue(_))));
    }

    #[test]
    fn test_failed_tests_counted_without_engine_count() {
        let mut result = ExecutionResult::new("a", 0, 1);
        result.tests = Some(vec![TestResult::passed("ok"), TestResult::failed("bad", "boom")]);

        assert_eq!(result.failed_tests(), 1);
        assert!(!result.all_tests_passed());
        assert!(ExecutionResult::new("b", 0, 1).all_tests_passed());
    }

    #[test]
    fn test_result_json_shape() {
        let result = ExecutionResult::new("r1", 1_700_000_000_000, 42)
            .with_response(ExecutedResponse {
                status: 200,
                status_text: "OK".to_string(),
                body: Some(ExecutionBody::text("hi")),
                ..ExecutedResponse::default()
            })
            .with_tests(vec![TestResult::passed("status")]);
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["requestId"], "r1");
        assert_eq!(json["response"]["body"]["data"], "aGk=");
        assert_eq!(json["testCount"], 1);
        assert_eq!(json["failedTestCount"], 0);
        assert_eq!(serde_json::from_value::<ExecutionResult>(json).unwrap(), result);
    }
}
