//! Inherited parameter resolution.
//!
//! A request's effective scenario, authorization, certificate and proxy are
//! found by walking from the request up to the root. Each kind is decided
//! independently by the nearest node that makes an explicit choice (an
//! entity or `Off`); kinds nobody decides are [`ResolvedParameter::NoneConfigured`].

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};
use crate::id::Id;
use crate::index::{IndexedEntities, NestedIndex};
use crate::workbook::{ParameterKind, RequestEntry, Selection, Selections};

/// Outcome of resolving one parameter kind.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ResolvedParameter {
    /// No node in the chain selects anything.
    #[default]
    NoneConfigured,
    /// A node in the chain explicitly turned the parameter off.
    Off,
    /// A node in the chain selected this entity.
    Selected {
        /// Entity id.
        id: Id,
        /// Cached entity name.
        name: String,
    },
}

impl ResolvedParameter {
    fn from_selection(selection: &Selection) -> Option<Self> {
        match selection {
            Selection::Inherit => None,
            Selection::Off => Some(Self::Off),
            Selection::Entity { id, name } => Some(Self::Selected {
                id: id.clone(),
                name: name.clone(),
            }),
        }
    }

    /// Returns true for [`ResolvedParameter::NoneConfigured`].
    #[must_use]
    pub const fn is_none_configured(&self) -> bool {
        matches!(self, Self::NoneConfigured)
    }

    /// Id of the selected entity, if any.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Selected { id, .. } => Some(id),
            _ => None,
        }
    }
}

/// The four resolved parameters of a request or group.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveParameters {
    /// Effective scenario.
    pub scenario: ResolvedParameter,
    /// Effective authorization.
    pub authorization: ResolvedParameter,
    /// Effective certificate.
    pub certificate: ResolvedParameter,
    /// Effective proxy.
    pub proxy: ResolvedParameter,
}

impl EffectiveParameters {
    /// The resolved value for one kind.
    #[must_use]
    pub const fn get(&self, kind: ParameterKind) -> &ResolvedParameter {
        match kind {
            ParameterKind::Scenario => &self.scenario,
            ParameterKind::Authorization => &self.authorization,
            ParameterKind::Certificate => &self.certificate,
            ParameterKind::Proxy => &self.proxy,
        }
    }

    fn get_mut(&mut self, kind: ParameterKind) -> &mut ResolvedParameter {
        match kind {
            ParameterKind::Scenario => &mut self.scenario,
            ParameterKind::Authorization => &mut self.authorization,
            ParameterKind::Certificate => &mut self.certificate,
            ParameterKind::Proxy => &mut self.proxy,
        }
    }

    /// Fills kinds that are still unconfigured from workspace-wide defaults.
    #[must_use]
    pub fn with_defaults(mut self, defaults: &Selections) -> Self {
        for kind in ParameterKind::ALL {
            let slot = self.get_mut(kind);
            if slot.is_none_configured() {
                if let Some(resolved) = ResolvedParameter::from_selection(defaults.get(kind)) {
                    *slot = resolved;
                }
            }
        }
        self
    }
}

/// Resolves the effective parameters of `id`, starting with its own
/// selections.
///
/// # Errors
///
/// Returns `NotFound` if `id` is not in the tree.
pub fn resolve_effective(
    requests: &NestedIndex<RequestEntry>,
    id: &str,
) -> DomainResult<EffectiveParameters> {
    if !requests.contains(id) {
        return Err(DomainError::NotFound(id.to_string()));
    }
    Ok(walk(requests, Some(id)))
}

/// Resolves what `id` would get if all its selections were
/// [`Selection::Inherit`], i.e. the effective parameters of its parent.
///
/// # Errors
///
/// Returns `NotFound` if `id` is not in the tree.
pub fn resolve_inherited(
    requests: &NestedIndex<RequestEntry>,
    id: &str,
) -> DomainResult<EffectiveParameters> {
    let parent = requests.find_parent(id)?;
    Ok(walk(requests, parent))
}

fn walk(requests: &NestedIndex<RequestEntry>, start: Option<&str>) -> EffectiveParameters {
    let mut slots: [Option<ResolvedParameter>; 4] = Default::default();
    let mut current = start;
    while let Some(id) = current {
        let Some(entry) = requests.find(id) else {
            break;
        };
        let selections = entry.selections();
        for (slot, kind) in slots.iter_mut().zip(ParameterKind::ALL) {
            if slot.is_none() {
                *slot = ResolvedParameter::from_selection(selections.get(kind));
            }
        }
        if slots.iter().all(Option::is_some) {
            break;
        }
        current = requests.find_parent(id).ok().flatten();
    }

    let [scenario, authorization, certificate, proxy] = slots.map(Option::unwrap_or_default);
    EffectiveParameters {
        scenario,
        authorization,
        certificate,
        proxy,
    }
}

/// Finds the entity a selection refers to: by id first, then by a
/// case-insensitive match on the cached name.
#[must_use]
pub fn find_matching<'a, T: Entity>(
    selection: &Selection,
    entities: &'a IndexedEntities<T>,
) -> Option<&'a T> {
    let Selection::Entity { id, name } = selection else {
        return None;
    };
    entities
        .find(id)
        .or_else(|| entities.iter().find(|e| e.name().eq_ignore_ascii_case(name)))
}

/// An entry of a parameter drop-down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionOption {
    /// Selection applied when the option is chosen.
    pub value: Selection,
    /// Text shown for the option.
    pub label: String,
}

/// Options for one parameter kind: the inherited default (labelled with what
/// it currently resolves to), `Off`, then every entity in order.
#[must_use]
pub fn selection_options<T: Entity>(
    inherited: &ResolvedParameter,
    entities: &IndexedEntities<T>,
) -> Vec<SelectionOption> {
    let default_label = match inherited {
        ResolvedParameter::NoneConfigured => "None Configured",
        ResolvedParameter::Off => "Off",
        ResolvedParameter::Selected { id, name } => entities.find(id).map_or(name.as_str(), |e| e.title()),
    };

    let mut options = Vec::with_capacity(entities.len() + 2);
    options.push(SelectionOption {
        value: Selection::Inherit,
        label: format!("Default ({default_label})"),
    });
    options.push(SelectionOption {
        value: Selection::Off,
        label: "Off".to_string(),
    });
    options.extend(entities.iter().map(|e| SelectionOption {
        value: Selection::entity(e.id(), e.name()),
        label: e.title().to_string(),
    }));
    options
}

/// Drop-down options for every parameter kind of one request or group.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterLists {
    /// Scenario options.
    pub scenarios: Vec<SelectionOption>,
    /// Authorization options.
    pub authorizations: Vec<SelectionOption>,
    /// Certificate options.
    pub certificates: Vec<SelectionOption>,
    /// Proxy options.
    pub proxies: Vec<SelectionOption>,
}
