//! On-disk shapes of workbooks and parameter files.

use serde::{Deserialize, Serialize};

use super::parameters::{Authorization, Certificate, Proxy, Scenario};
use super::request::RequestEntry;
use super::selection::Selections;
use crate::index::TreeNode;

/// Format version written by this crate.
pub const WORKBOOK_VERSION: u32 = 1;

const fn default_version() -> u32 {
    WORKBOOK_VERSION
}

/// A workbook file: the request tree, workbook-persisted parameters and the
/// workbook-wide default selections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workbook {
    /// Format version.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Request tree.
    #[serde(default)]
    pub requests: Vec<TreeNode<RequestEntry>>,
    /// Scenarios.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scenarios: Vec<Scenario>,
    /// Authorizations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authorizations: Vec<Authorization>,
    /// Certificates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certificates: Vec<Certificate>,
    /// Proxies.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proxies: Vec<Proxy>,
    /// Default selections used when the request tree selects nothing.
    #[serde(flatten)]
    pub defaults: Selections,
}

impl Default for Workbook {
    fn default() -> Self {
        Self {
            version: WORKBOOK_VERSION,
            requests: Vec::new(),
            scenarios: Vec::new(),
            authorizations: Vec::new(),
            certificates: Vec::new(),
            proxies: Vec::new(),
            defaults: Selections::default(),
        }
    }
}

/// A private or global parameters file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterFile {
    /// Format version.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Scenarios.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scenarios: Vec<Scenario>,
    /// Authorizations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authorizations: Vec<Authorization>,
    /// Certificates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certificates: Vec<Certificate>,
    /// Proxies.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proxies: Vec<Proxy>,
}

impl Default for ParameterFile {
    fn default() -> Self {
        Self {
            version: WORKBOOK_VERSION,
            scenarios: Vec::new(),
            authorizations: Vec::new(),
            certificates: Vec::new(),
            proxies: Vec::new(),
        }
    }
}

impl ParameterFile {
    /// Returns true if the file holds no entity.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
            && self.authorizations.is_empty()
            && self.certificates.is_empty()
            && self.proxies.is_empty()
    }
}

/// The three files a workspace is saved to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorkbookFiles {
    /// The workbook itself.
    pub workbook: Workbook,
    /// Parameters stored next to the workbook.
    pub private: ParameterFile,
    /// Parameters shared by every workbook of the user.
    pub global: ParameterFile,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::entity::Entity;
    use crate::index::NestedIndex;

    #[test]
    fn test_workbook_with_nested_requests_parses() {
        let json = serde_json::json!({
            "version": 1,
            "requests": [
                {
                    "type": "group",
                    "id": "g1",
                    "name": "Users",
                    "children": [
                        {
                            "type": "group",
                            "id": "g2",
                            "children": [{"type": "request", "id": "r1", "url": "http://localhost/users"}]
                        },
                        {"type": "request", "id": "r2"}
                    ]
                },
                {"type": "request", "id": "r3"}
            ],
            "selectedProxy": {"mode": "off"}
        });

        let workbook: Workbook = serde_json::from_value(json).unwrap();
        assert_eq!(workbook.requests.len(), 2);
        assert_eq!(workbook.requests[0].children.len(), 2);
        assert_eq!(workbook.requests[0].children[0].children[0].entity.id(), "r1");
        assert!(workbook.requests[1].children.is_empty());
        assert!(workbook.scenarios.is_empty());

        let index = NestedIndex::from_serializable(workbook.requests.clone()).unwrap();
        assert_eq!(index.find_parent("r1").unwrap(), Some("g2"));
        assert_eq!(index.children("g1").unwrap(), ["g2".to_string(), "r2".to_string()]);

        // Leaves are written without a children key
        let written = serde_json::to_value(&workbook).unwrap();
        assert!(written["requests"][1].get("children").is_none());
        assert_eq!(serde_json::from_value::<Workbook>(written).unwrap(), workbook);
    }
}
