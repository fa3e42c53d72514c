//! Serializable shapes of the indices.
//!
//! Two shapes exist: the plain tree ([`TreeNode`]), which is what workbook
//! files store, and the indexed snapshot ([`FlatSnapshot`] /
//! [`NestedSnapshot`]), which mirrors the in-memory maps and is what the
//! execution engine receives. Maps are `BTreeMap` so output is stable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::Id;

/// An entity with its ordered children, as stored in workbook files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode<T> {
    /// The entity itself; its fields sit at the same level as `children`.
    #[serde(flatten)]
    pub entity: T,

    /// Ordered children; only containers may carry any.
    #[serde(default = "Vec::new", skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Self>,
}

impl<T> TreeNode<T> {
    /// Creates a node without children.
    #[must_use]
    pub const fn leaf(entity: T) -> Self {
        Self {
            entity,
            children: Vec::new(),
        }
    }

    /// Creates a node with the given children.
    #[must_use]
    pub const fn with_children(entity: T, children: Vec<Self>) -> Self {
        Self { entity, children }
    }
}

/// Indexed form of a flat index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatSnapshot<T> {
    /// Entity order.
    pub top_level_ids: Vec<Id>,
    /// Entities by id.
    pub entities: BTreeMap<Id, T>,
}

impl<T> Default for FlatSnapshot<T> {
    fn default() -> Self {
        Self {
            top_level_ids: Vec::new(),
            entities: BTreeMap::new(),
        }
    }
}

/// Indexed form of a nested index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedSnapshot<T> {
    /// Order of the roots.
    pub top_level_ids: Vec<Id>,
    /// Ordered children per container; containers without children are
    /// omitted.
    #[serde(default)]
    pub child_ids: BTreeMap<Id, Vec<Id>>,
    /// Entities by id.
    pub entities: BTreeMap<Id, T>,
}

impl<T> Default for NestedSnapshot<T> {
    fn default() -> Self {
        Self {
            top_level_ids: Vec::new(),
            child_ids: BTreeMap::new(),
            entities: BTreeMap::new(),
        }
    }
}
