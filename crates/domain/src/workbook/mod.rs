//! The workbook entity catalog: requests, groups, parameter entities and the
//! selection references between them.

mod bytes;
pub mod file;
pub mod parameters;
pub mod request;
pub mod selection;

pub use file::{ParameterFile, WORKBOOK_VERSION, Workbook, WorkbookFiles};
pub use parameters::{
    Authorization, AuthorizationKind, Certificate, CertificateKind, ParameterEntity, Persistence,
    Proxy, Scenario,
};
pub use request::{
    BodyKind, GroupExecution, HttpMethod, NameValuePair, Request, RequestBody, RequestEntry,
    RequestGroup,
};
pub use selection::{ParameterKind, Selection, Selections};
