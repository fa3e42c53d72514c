//! Workbench settings.
//!
//! Every field has a serde default, so partial or older settings files load.

use serde::{Deserialize, Serialize};

use crate::execution::{DEFAULT_LONG_TEXT_THRESHOLD, DEFAULT_PANEL, ExecutionSettings};

/// Test script given to newly added requests.
pub const DEFAULT_REQUEST_TEST: &str = "describe('status', () => {\n    it('equals 200', () => {\n        expect(response.status).to.equal(200)\n    })\n})";

/// User-level configuration of the editor core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkbenchSettings {
    /// Response text longer than this (in bytes) is flagged as too long to
    /// render inline.
    #[serde(default = "default_long_text_threshold")]
    pub long_text_threshold: usize,

    /// Result panel selected after a failed or group run.
    #[serde(default = "default_panel")]
    pub default_panel: String,

    /// Appended to the name of copied requests and groups.
    #[serde(default = "default_request_copy_suffix")]
    pub request_copy_suffix: String,

    /// Appended to the name of copied scenarios, authorizations,
    /// certificates and proxies.
    #[serde(default = "default_parameter_copy_suffix")]
    pub parameter_copy_suffix: String,

    /// Test script of newly added requests.
    #[serde(default = "default_request_test")]
    pub new_request_test: String,
}

const fn default_long_text_threshold() -> usize {
    DEFAULT_LONG_TEXT_THRESHOLD
}

fn default_panel() -> String {
    DEFAULT_PANEL.to_string()
}

fn default_request_copy_suffix() -> String {
    " - copy".to_string()
}

fn default_parameter_copy_suffix() -> String {
    " - Copy".to_string()
}

fn default_request_test() -> String {
    DEFAULT_REQUEST_TEST.to_string()
}

impl Default for WorkbenchSettings {
    fn default() -> Self {
        Self {
            long_text_threshold: default_long_text_threshold(),
            default_panel: default_panel(),
            request_copy_suffix: default_request_copy_suffix(),
            parameter_copy_suffix: default_parameter_copy_suffix(),
            new_request_test: default_request_test(),
        }
    }
}

impl WorkbenchSettings {
    /// Settings of the execution tracker.
    #[must_use]
    pub fn execution(&self) -> ExecutionSettings {
        ExecutionSettings {
            long_text_threshold: self.long_text_threshold,
            default_panel: self.default_panel.clone(),
        }
    }
}
