//! References from requests and groups to parameter entities.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::Id;

/// A request's or group's choice for one parameter kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum Selection {
    /// Use whatever the nearest ancestor selects.
    #[default]
    Inherit,
    /// Explicitly use nothing, overriding ancestors.
    Off,
    /// Use a specific entity.
    Entity {
        /// Id of the selected entity.
        id: Id,
        /// Name of the entity when it was selected, kept for display and
        /// for matching when the id no longer resolves.
        name: String,
    },
}

impl Selection {
    /// Creates a reference to a specific entity.
    #[must_use]
    pub fn entity(id: impl Into<Id>, name: impl Into<String>) -> Self {
        Self::Entity {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Returns true for [`Selection::Inherit`].
    #[must_use]
    pub const fn is_inherit(&self) -> bool {
        matches!(self, Self::Inherit)
    }

    /// Returns true for [`Selection::Off`].
    #[must_use]
    pub const fn is_off(&self) -> bool {
        matches!(self, Self::Off)
    }

    /// Id of the selected entity, if any.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Entity { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Returns true if this selection references `id`.
    #[must_use]
    pub fn points_at(&self, id: &str) -> bool {
        self.id() == Some(id)
    }
}

/// The four kinds of parameter a request can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterKind {
    /// Variable sets.
    Scenario,
    /// Credentials.
    Authorization,
    /// Client certificates.
    Certificate,
    /// Outbound proxies.
    Proxy,
}

impl ParameterKind {
    /// All kinds, in display order.
    pub const ALL: [Self; 4] = [
        Self::Scenario,
        Self::Authorization,
        Self::Certificate,
        Self::Proxy,
    ];

    /// Lowercase display name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scenario => "scenario",
            Self::Authorization => "authorization",
            Self::Certificate => "certificate",
            Self::Proxy => "proxy",
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One selection per parameter kind.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selections {
    /// Selected scenario.
    #[serde(default, skip_serializing_if = "Selection::is_inherit")]
    pub selected_scenario: Selection,
    /// Selected authorization.
    #[serde(default, skip_serializing_if = "Selection::is_inherit")]
    pub selected_authorization: Selection,
    /// Selected certificate.
    #[serde(default, skip_serializing_if = "Selection::is_inherit")]
    pub selected_certificate: Selection,
    /// Selected proxy.
    #[serde(default, skip_serializing_if = "Selection::is_inherit")]
    pub selected_proxy: Selection,
}

impl Selections {
    /// Selection for one kind.
    #[must_use]
    pub const fn get(&self, kind: ParameterKind) -> &Selection {
        match kind {
            ParameterKind::Scenario => &self.selected_scenario,
            ParameterKind::Authorization => &self.selected_authorization,
            ParameterKind::Certificate => &self.selected_certificate,
            ParameterKind::Proxy => &self.selected_proxy,
        }
    }

    /// Mutable selection for one kind.
    pub fn get_mut(&mut self, kind: ParameterKind) -> &mut Selection {
        match kind {
            ParameterKind::Scenario => &mut self.selected_scenario,
            ParameterKind::Authorization => &mut self.selected_authorization,
            ParameterKind::Certificate => &mut self.selected_certificate,
            ParameterKind::Proxy => &mut self.selected_proxy,
        }
    }

    /// Resets the selection for `kind` to inherit if it references `id`.
    ///
    /// Returns true if something changed.
    pub fn clear_reference(&mut self, kind: ParameterKind, id: &str) -> bool {
        let selection = self.get_mut(kind);
        if selection.points_at(id) {
            *selection = Selection::Inherit;
            true
        } else {
            false
        }
    }
}
