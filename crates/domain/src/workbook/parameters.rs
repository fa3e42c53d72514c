//! Parameter entities: scenarios, authorizations, certificates and proxies.

use serde::{Deserialize, Serialize};

use super::request::NameValuePair;
use super::selection::{ParameterKind, Selection};
use crate::entity::Entity;
use crate::id::{Id, IdGenerator};

/// Which file a parameter entity is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Persistence {
    /// Saved with the workbook.
    #[default]
    Workbook,
    /// Saved next to the workbook, meant to stay out of version control.
    Private,
    /// Saved in the user's global parameters file.
    Global,
}

impl Persistence {
    /// Returns true for [`Persistence::Workbook`].
    #[must_use]
    pub const fn is_workbook(&self) -> bool {
        matches!(self, Self::Workbook)
    }
}

/// An entity that can be selected by requests and saved per [`Persistence`].
pub trait ParameterEntity: Entity {
    /// The kind requests select this entity as.
    const KIND: ParameterKind;

    /// Where the entity is saved.
    fn persistence(&self) -> Persistence;

    /// Changes where the entity is saved.
    fn set_persistence(&mut self, persistence: Persistence);

    /// Resets any selection of `kind` held by this entity that references
    /// `id`. Returns true if something changed.
    fn clear_reference(&mut self, _kind: ParameterKind, _id: &str) -> bool {
        false
    }
}

macro_rules! parameter_entity {
    ($ty:ty, $kind:expr) => {
        impl ParameterEntity for $ty {
            const KIND: ParameterKind = $kind;

            fn persistence(&self) -> Persistence {
                self.persistence
            }

            fn set_persistence(&mut self, persistence: Persistence) {
                self.persistence = persistence;
            }
        }
    };
}

macro_rules! named_entity {
    () => {
        fn id(&self) -> &str {
            &self.id
        }

        fn set_id(&mut self, id: Id) {
            self.id = id;
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn set_name(&mut self, name: String) {
            self.name = name;
        }
    };
}

/// A named set of variables substituted into requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    /// Entity id.
    pub id: Id,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Storage location.
    #[serde(default, skip_serializing_if = "Persistence::is_workbook")]
    pub persistence: Persistence,
    /// Variable rows.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<NameValuePair>,
}

impl Scenario {
    /// Creates an empty scenario.
    #[must_use]
    pub fn new(id: impl Into<Id>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            persistence: Persistence::Workbook,
            variables: Vec::new(),
        }
    }

    /// Sets the variable rows.
    #[must_use]
    pub fn with_variables(mut self, variables: Vec<NameValuePair>) -> Self {
        self.variables = variables;
        self
    }
}

impl Entity for Scenario {
    named_entity!();

    fn regenerate_nested_ids(&mut self, ids: &dyn IdGenerator) {
        for variable in &mut self.variables {
            variable.id = ids.generate();
        }
    }

    fn nested_ids(&self) -> Vec<&str> {
        self.variables.iter().map(|v| v.id.as_str()).collect()
    }
}

parameter_entity!(Scenario, ParameterKind::Scenario);

/// Credentials attached to requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum AuthorizationKind {
    /// HTTP basic authentication.
    Basic {
        /// User name.
        username: String,
        /// Password.
        password: String,
    },
    /// OAuth2 client-credentials flow.
    #[serde(rename = "oAuth2Client")]
    OAuth2Client {
        /// Token endpoint.
        access_token_url: String,
        /// Client id.
        client_id: String,
        /// Client secret.
        client_secret: String,
        /// Requested scope.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scope: Option<String>,
        /// Certificate used when calling the token endpoint.
        #[serde(default, skip_serializing_if = "Selection::is_inherit")]
        selected_certificate: Selection,
        /// Proxy used when calling the token endpoint.
        #[serde(default, skip_serializing_if = "Selection::is_inherit")]
        selected_proxy: Selection,
    },
    /// A static key sent in a header.
    ApiKey {
        /// Header name.
        header: String,
        /// Header value.
        value: String,
    },
}

/// A named set of credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    /// Entity id.
    pub id: Id,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Storage location.
    #[serde(default, skip_serializing_if = "Persistence::is_workbook")]
    pub persistence: Persistence,
    /// Scheme and its settings.
    #[serde(flatten)]
    pub kind: AuthorizationKind,
}

impl Authorization {
    /// Creates an authorization of the given kind.
    #[must_use]
    pub fn new(id: impl Into<Id>, name: impl Into<String>, kind: AuthorizationKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            persistence: Persistence::Workbook,
            kind,
        }
    }

    /// An empty basic authorization, used for newly added entries.
    #[must_use]
    pub fn basic(id: impl Into<Id>) -> Self {
        Self::new(
            id,
            String::new(),
            AuthorizationKind::Basic {
                username: String::new(),
                password: String::new(),
            },
        )
    }
}

impl Entity for Authorization {
    named_entity!();
}

impl ParameterEntity for Authorization {
    const KIND: ParameterKind = ParameterKind::Authorization;

    fn persistence(&self) -> Persistence {
        self.persistence
    }

    fn set_persistence(&mut self, persistence: Persistence) {
        self.persistence = persistence;
    }

    fn clear_reference(&mut self, kind: ParameterKind, id: &str) -> bool {
        let AuthorizationKind::OAuth2Client {
            selected_certificate,
            selected_proxy,
            ..
        } = &mut self.kind
        else {
            return false;
        };
        let selection = match kind {
            ParameterKind::Certificate => selected_certificate,
            ParameterKind::Proxy => selected_proxy,
            ParameterKind::Scenario | ParameterKind::Authorization => return false,
        };
        if selection.points_at(id) {
            *selection = Selection::Inherit;
            true
        } else {
            false
        }
    }
}

/// Client certificate material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CertificateKind {
    /// PKCS#12 archive.
    #[serde(rename = "PKCS12")]
    Pkcs12 {
        /// Archive bytes.
        #[serde(with = "super::bytes")]
        pfx: Vec<u8>,
        /// Archive password.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },
    /// PEM certificate with a separate PKCS#8 key.
    #[serde(rename = "PKCS8_PEM")]
    Pkcs8Pem {
        /// Certificate bytes.
        #[serde(with = "super::bytes")]
        pem: Vec<u8>,
        /// Key bytes.
        #[serde(with = "super::bytes")]
        key: Vec<u8>,
    },
    /// PEM bundle holding both certificate and key.
    #[serde(rename = "PEM")]
    Pem {
        /// Bundle bytes.
        #[serde(with = "super::bytes")]
        pem: Vec<u8>,
    },
}

/// A named client certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    /// Entity id.
    pub id: Id,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Storage location.
    #[serde(default, skip_serializing_if = "Persistence::is_workbook")]
    pub persistence: Persistence,
    /// Format and material.
    #[serde(flatten)]
    pub kind: CertificateKind,
}

impl Certificate {
    /// Creates a certificate of the given kind.
    #[must_use]
    pub fn new(id: impl Into<Id>, name: impl Into<String>, kind: CertificateKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            persistence: Persistence::Workbook,
            kind,
        }
    }

    /// An empty PEM certificate, used for newly added entries.
    #[must_use]
    pub fn pem(id: impl Into<Id>) -> Self {
        Self::new(id, String::new(), CertificateKind::Pem { pem: Vec::new() })
    }
}

impl Entity for Certificate {
    named_entity!();
}

parameter_entity!(Certificate, ParameterKind::Certificate);

/// A named outbound proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proxy {
    /// Entity id.
    pub id: Id,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Storage location.
    #[serde(default, skip_serializing_if = "Persistence::is_workbook")]
    pub persistence: Persistence,
    /// Proxy URL.
    #[serde(default)]
    pub url: String,
}

impl Proxy {
    /// Creates a proxy.
    #[must_use]
    pub fn new(id: impl Into<Id>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            persistence: Persistence::Workbook,
            url: url.into(),
        }
    }
}

impl Entity for Proxy {
    named_entity!();
}

parameter_entity!(Proxy, ParameterKind::Proxy);
