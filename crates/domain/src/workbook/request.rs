//! Requests and request groups, the entities of the request tree.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::selection::{ParameterKind, Selection, Selections};
use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};
use crate::id::{Id, IdGenerator};

/// HTTP methods a request can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET
    #[default]
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
    /// PATCH
    Patch,
    /// HEAD
    Head,
    /// OPTIONS
    Options,
}

impl HttpMethod {
    /// Returns the method as a static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> DomainResult<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "PATCH" => Ok(Self::Patch),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            _ => Err(DomainError::InvalidValue(format!("unsupported HTTP method: {s}"))),
        }
    }
}

/// A header, query parameter, form field or variable row.
///
/// Rows carry their own id so editors can track them across reorders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameValuePair {
    /// Row id.
    pub id: Id,
    /// Name.
    pub name: String,
    /// Value.
    #[serde(default)]
    pub value: String,
    /// Disabled rows are kept but not sent.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
}

impl NameValuePair {
    /// Creates an enabled row.
    #[must_use]
    pub fn new(id: impl Into<Id>, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            value: value.into(),
            disabled: false,
        }
    }
}

fn regenerate_rows(rows: &mut [NameValuePair], ids: &dyn IdGenerator) {
    for row in rows {
        row.id = ids.generate();
    }
}

/// The kinds of body a request can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyKind {
    /// No body.
    None,
    /// Plain text.
    Text,
    /// JSON text.
    #[serde(rename = "JSON")]
    Json,
    /// XML text.
    #[serde(rename = "XML")]
    Xml,
    /// URL-encoded form fields.
    Form,
    /// Arbitrary bytes.
    Raw,
}

/// A request body.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RequestBody {
    /// No body.
    #[default]
    None,
    /// Plain text.
    Text(String),
    /// JSON text, stored verbatim so that templates survive.
    #[serde(rename = "JSON")]
    Json(String),
    /// XML text.
    #[serde(rename = "XML")]
    Xml(String),
    /// URL-encoded form fields.
    Form(Vec<NameValuePair>),
    /// Arbitrary bytes, base64 on the wire.
    Raw(#[serde(with = "super::bytes")] Vec<u8>),
}

impl RequestBody {
    /// Kind of this body.
    #[must_use]
    pub const fn kind(&self) -> BodyKind {
        match self {
            Self::None => BodyKind::None,
            Self::Text(_) => BodyKind::Text,
            Self::Json(_) => BodyKind::Json,
            Self::Xml(_) => BodyKind::Xml,
            Self::Form(_) => BodyKind::Form,
            Self::Raw(_) => BodyKind::Raw,
        }
    }

    /// Returns true for [`RequestBody::None`].
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// The body as text; form fields are URL-encoded, bytes are decoded
    /// lossily as UTF-8.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::None => String::new(),
            Self::Text(text) | Self::Json(text) | Self::Xml(text) => text.clone(),
            Self::Form(fields) => encode_form(fields),
            Self::Raw(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    /// Converts the body to another kind, carrying its content over.
    ///
    /// Text kinds convert into each other unchanged. Converting text to a
    /// form parses it as URL-encoded pairs, each field getting a fresh id;
    /// text that does not parse yields an empty form. A form converts back
    /// to URL-encoded text.
    #[must_use]
    pub fn convert(&self, kind: BodyKind, ids: &dyn IdGenerator) -> Self {
        if self.kind() == kind {
            return self.clone();
        }
        match kind {
            BodyKind::None => Self::None,
            BodyKind::Text => Self::Text(self.to_text()),
            BodyKind::Json => Self::Json(self.to_text()),
            BodyKind::Xml => Self::Xml(self.to_text()),
            BodyKind::Raw => Self::Raw(self.to_text().into_bytes()),
            BodyKind::Form => Self::Form(decode_form(&self.to_text(), ids)),
        }
    }

    fn rows_mut(&mut self) -> Option<&mut Vec<NameValuePair>> {
        match self {
            Self::Form(fields) => Some(fields),
            _ => None,
        }
    }

    fn rows(&self) -> &[NameValuePair] {
        match self {
            Self::Form(fields) => fields,
            _ => &[],
        }
    }
}

fn encode_form(fields: &[NameValuePair]) -> String {
    let pairs: Vec<(&str, &str)> = fields
        .iter()
        .filter(|f| !f.disabled)
        .map(|f| (f.name.as_str(), f.value.as_str()))
        .collect();
    serde_urlencoded::to_string(pairs).unwrap_or_default()
}

fn decode_form(text: &str, ids: &dyn IdGenerator) -> Vec<NameValuePair> {
    serde_urlencoded::from_str::<Vec<(String, String)>>(text.trim())
        .unwrap_or_default()
        .into_iter()
        .map(|(name, value)| NameValuePair::new(ids.generate(), name, value))
        .collect()
}

/// How a group runs its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupExecution {
    /// One after another; durations add up.
    #[default]
    Sequential,
    /// All at once; the slowest determines the duration.
    Concurrent,
}

const fn default_runs() -> u32 {
    1
}

/// A single HTTP request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Entity id.
    pub id: Id,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Target URL, possibly templated.
    #[serde(default)]
    pub url: String,
    /// HTTP method.
    #[serde(default)]
    pub method: HttpMethod,
    /// Timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    /// Header rows.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<NameValuePair>,
    /// Query string rows.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query_string_params: Vec<NameValuePair>,
    /// Body.
    #[serde(default, skip_serializing_if = "RequestBody::is_none")]
    pub body: RequestBody,
    /// Test script run against the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,
    /// Reuse the connection.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub keep_alive: bool,
    /// Number of times the request runs per execution.
    #[serde(default = "default_runs")]
    pub runs: u32,
    /// Parameter selections.
    #[serde(flatten)]
    pub selections: Selections,
}

impl Request {
    /// Creates an unnamed GET request that runs once.
    #[must_use]
    pub fn new(id: impl Into<Id>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            url: String::new(),
            method: HttpMethod::Get,
            timeout: None,
            headers: Vec::new(),
            query_string_params: Vec::new(),
            body: RequestBody::None,
            test: None,
            keep_alive: false,
            runs: default_runs(),
            selections: Selections::default(),
        }
    }

    /// Sets the name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Sets the method.
    #[must_use]
    pub const fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Sets the header rows.
    #[must_use]
    pub fn with_headers(mut self, headers: Vec<NameValuePair>) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Sets the test script.
    #[must_use]
    pub fn with_test(mut self, test: impl Into<String>) -> Self {
        self.test = Some(test.into());
        self
    }

    /// Sets the selection for one parameter kind.
    #[must_use]
    pub fn with_selection(mut self, kind: ParameterKind, selection: Selection) -> Self {
        *self.selections.get_mut(kind) = selection;
        self
    }
}

/// A folder of requests and nested groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestGroup {
    /// Entity id.
    pub id: Id,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Number of times the group runs per execution.
    #[serde(default = "default_runs")]
    pub runs: u32,
    /// Sequential or concurrent execution of children.
    #[serde(default)]
    pub execution: GroupExecution,
    /// Parameter selections inherited by children.
    #[serde(flatten)]
    pub selections: Selections,
}

impl RequestGroup {
    /// Creates an unnamed sequential group that runs once.
    #[must_use]
    pub fn new(id: impl Into<Id>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            runs: default_runs(),
            execution: GroupExecution::Sequential,
            selections: Selections::default(),
        }
    }

    /// Sets the name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the execution mode.
    #[must_use]
    pub const fn with_execution(mut self, execution: GroupExecution) -> Self {
        self.execution = execution;
        self
    }

    /// Sets the selection for one parameter kind.
    #[must_use]
    pub fn with_selection(mut self, kind: ParameterKind, selection: Selection) -> Self {
        *self.selections.get_mut(kind) = selection;
        self
    }
}

/// An entry of the request tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RequestEntry {
    /// A request (leaf).
    Request(Request),
    /// A group (container).
    Group(RequestGroup),
}

impl RequestEntry {
    /// Returns true for groups.
    #[must_use]
    pub const fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }

    /// The request, if this entry is one.
    #[must_use]
    pub const fn as_request(&self) -> Option<&Request> {
        match self {
            Self::Request(request) => Some(request),
            Self::Group(_) => None,
        }
    }

    /// The request, if this entry is one.
    pub fn as_request_mut(&mut self) -> Option<&mut Request> {
        match self {
            Self::Request(request) => Some(request),
            Self::Group(_) => None,
        }
    }

    /// The group, if this entry is one.
    #[must_use]
    pub const fn as_group(&self) -> Option<&RequestGroup> {
        match self {
            Self::Group(group) => Some(group),
            Self::Request(_) => None,
        }
    }

    /// The group, if this entry is one.
    pub fn as_group_mut(&mut self) -> Option<&mut RequestGroup> {
        match self {
            Self::Group(group) => Some(group),
            Self::Request(_) => None,
        }
    }

    /// Runs per execution.
    #[must_use]
    pub const fn runs(&self) -> u32 {
        match self {
            Self::Request(request) => request.runs,
            Self::Group(group) => group.runs,
        }
    }

    /// Sets runs per execution.
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` for zero.
    pub fn set_runs(&mut self, runs: u32) -> DomainResult<()> {
        if runs == 0 {
            return Err(DomainError::InvalidValue("runs must be at least 1".to_string()));
        }
        match self {
            Self::Request(request) => request.runs = runs,
            Self::Group(group) => group.runs = runs,
        }
        Ok(())
    }

    /// Parameter selections.
    #[must_use]
    pub const fn selections(&self) -> &Selections {
        match self {
            Self::Request(request) => &request.selections,
            Self::Group(group) => &group.selections,
        }
    }

    /// Parameter selections.
    pub fn selections_mut(&mut self) -> &mut Selections {
        match self {
            Self::Request(request) => &mut request.selections,
            Self::Group(group) => &mut group.selections,
        }
    }
}

impl From<Request> for RequestEntry {
    fn from(request: Request) -> Self {
        Self::Request(request)
    }
}

impl From<RequestGroup> for RequestEntry {
    fn from(group: RequestGroup) -> Self {
        Self::Group(group)
    }
}

impl Entity for RequestEntry {
    fn id(&self) -> &str {
        match self {
            Self::Request(request) => &request.id,
            Self::Group(group) => &group.id,
        }
    }

    fn set_id(&mut self, id: Id) {
        match self {
            Self::Request(request) => request.id = id,
            Self::Group(group) => group.id = id,
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Request(request) => &request.name,
            Self::Group(group) => &group.name,
        }
    }

    fn set_name(&mut self, name: String) {
        match self {
            Self::Request(request) => request.name = name,
            Self::Group(group) => group.name = name,
        }
    }

    fn is_container(&self) -> bool {
        self.is_group()
    }

    fn regenerate_nested_ids(&mut self, ids: &dyn IdGenerator) {
        if let Self::Request(request) = self {
            regenerate_rows(&mut request.headers, ids);
            regenerate_rows(&mut request.query_string_params, ids);
            if let Some(fields) = request.body.rows_mut() {
                regenerate_rows(fields, ids);
            }
        }
    }

    fn nested_ids(&self) -> Vec<&str> {
        match self {
            Self::Request(request) => request
                .headers
                .iter()
                .chain(&request.query_string_params)
                .chain(request.body.rows())
                .map(|row| row.id.as_str())
                .collect(),
            Self::Group(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::id::SequentialIdGenerator;
    use crate::index::{NestedIndex, TreeNode};

    #[test]
    fn test_method_parsing() {
        assert_eq!("patch".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        assert!("FETCH".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_form_to_text_and_back() {
        let ids = SequentialIdGenerator::new("f");
        let mut hidden = NameValuePair::new("r3", "hidden", "x");
        hidden.disabled = true;
        let form = RequestBody::Form(vec![
            NameValuePair::new("r1", "q", "a b"),
            NameValuePair::new("r2", "lang", "en&fr"),
            hidden,
        ]);

        let text = form.convert(BodyKind::Text, &ids);
        assert_eq!(text, RequestBody::Text("q=a+b&lang=en%26fr".to_string()));

        let back = text.convert(BodyKind::Form, &ids);
        assert_eq!(
            back,
            RequestBody::Form(vec![
                NameValuePair::new("f-1", "q", "a b"),
                NameValuePair::new("f-2", "lang", "en&fr"),
            ])
        );
    }

    #[test]
    fn test_text_kinds_keep_content() {
        let ids = SequentialIdGenerator::new("f");
        let json = RequestBody::Json("{\"a\":1}".to_string());

        assert_eq!(json.convert(BodyKind::Xml, &ids), RequestBody::Xml("{\"a\":1}".to_string()));
        assert_eq!(
            json.convert(BodyKind::Raw, &ids),
            RequestBody::Raw(b"{\"a\":1}".to_vec())
        );
        assert_eq!(json.convert(BodyKind::None, &ids), RequestBody::None);
        assert_eq!(
            RequestBody::None.convert(BodyKind::Text, &ids),
            RequestBody::Text(String::new())
        );
    }

    #[test]
    fn test_body_json_shape() {
        let raw = RequestBody::Raw(vec![0, 1, 2, 255]);
        let json = serde_json::to_value(&raw).unwrap();
        assert_eq!(json, serde_json::json!({"type": "Raw", "data": "AAEC/w=="}));
        assert_eq!(serde_json::from_value::<RequestBody>(json).unwrap(), raw);

        let text = serde_json::to_value(RequestBody::Json("{}".to_string())).unwrap();
        assert_eq!(text, serde_json::json!({"type": "JSON", "data": "{}"}));
    }

    #[test]
    fn test_entry_json_in_tree() {
        let request = Request::new("r1")
            .with_name("List users")
            .with_method(HttpMethod::Post)
            .with_headers(vec![NameValuePair::new("h1", "Accept", "application/json")])
            .with_body(RequestBody::Form(vec![NameValuePair::new("b1", "a", "1")]))
            .with_selection(ParameterKind::Scenario, Selection::entity("s1", "Dev"));
        let group = RequestGroup::new("g1")
            .with_name("Users")
            .with_execution(GroupExecution::Concurrent)
            .with_selection(ParameterKind::Proxy, Selection::Off);
        let mut index = NestedIndex::new();
        index.insert(group.into(), None, None).unwrap();
        index.insert(request.into(), Some("g1"), None).unwrap();

        let json = serde_json::to_value(index.to_serializable()).unwrap();
        assert_eq!(json[0]["type"], "group");
        assert_eq!(json[0]["execution"], "CONCURRENT");
        assert_eq!(json[0]["selectedProxy"]["mode"], "off");
        assert_eq!(json[0]["children"][0]["type"], "request");
        assert_eq!(json[0]["children"][0]["method"], "POST");
        assert_eq!(json[0]["children"][0]["selectedScenario"]["id"], "s1");

        let nodes: Vec<TreeNode<RequestEntry>> = serde_json::from_value(json).unwrap();
        assert_eq!(NestedIndex::from_serializable(nodes).unwrap(), index);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let entry: RequestEntry =
            serde_json::from_value(serde_json::json!({"type": "request", "id": "r1"})).unwrap();
        let request = entry.as_request().unwrap();

        assert_eq!(request.runs, 1);
        assert_eq!(request.method, HttpMethod::Get);
        assert!(request.selections.selected_scenario.is_inherit());
    }

    #[test]
    fn test_nested_ids_regenerate() {
        let ids = SequentialIdGenerator::new("n");
        let mut entry: RequestEntry = Request::new("r1")
            .with_headers(vec![NameValuePair::new("h1", "A", "1")])
            .with_body(RequestBody::Form(vec![NameValuePair::new("b1", "a", "1")]))
            .into();

        assert_eq!(entry.nested_ids(), vec!["h1", "b1"]);
        entry.regenerate_nested_ids(&ids);
        assert_eq!(entry.nested_ids(), vec!["n-1", "n-2"]);
    }

    #[test]
    fn test_runs_must_be_positive() {
        let mut entry: RequestEntry = RequestGroup::new("g").into();
        assert!(entry.set_runs(0).is_err());
        entry.set_runs(3).unwrap();
        assert_eq!(entry.runs(), 3);
    }
}
