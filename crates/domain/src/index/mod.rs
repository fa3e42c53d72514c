//! Ordered entity indices.
//!
//! [`IndexedEntities`] is a flat, ordered collection (scenarios,
//! authorizations, certificates, proxies). [`NestedIndex`] adds parent/child
//! ordering for the request tree. Both are generic over [`Entity`] and are the
//! only place where ordering invariants are enforced.
//!
//! [`Entity`]: crate::entity::Entity

mod flat;
mod nested;
mod snapshot;

pub use flat::IndexedEntities;
pub use nested::{NestedIndex, OutlineEntry};
pub use snapshot::{FlatSnapshot, NestedSnapshot, TreeNode};

use serde::{Deserialize, Serialize};

/// Where to place an entity relative to an anchor.
///
/// With no anchor the top level is the destination: `Before` and
/// `FirstChild` go to its start, `After` and `LastChild` to its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Position {
    /// Immediately before the anchor, among the anchor's siblings.
    Before,
    /// Immediately after the anchor, among the anchor's siblings.
    After,
    /// First child of the anchor, which must be a container.
    FirstChild,
    /// Last child of the anchor, which must be a container.
    LastChild,
}

impl Position {
    /// Whether the placement goes inside the anchor.
    #[must_use]
    pub const fn is_inside(self) -> bool {
        matches!(self, Self::FirstChild | Self::LastChild)
    }

    /// Whether the placement lands at the start of the destination list
    /// when there is no anchor.
    const fn at_start(self) -> bool {
        matches!(self, Self::Before | Self::FirstChild)
    }
}

/// Inserts `id` into `list` relative to `anchor` (or at the list edge when
/// there is no anchor). The anchor must be present in `list`.
fn place(list: &mut Vec<String>, id: String, anchor: Option<&str>, position: Position) {
    let index = match anchor {
        Some(anchor) => {
            let found = list.iter().position(|x| x == anchor).unwrap_or(list.len());
            match position {
                Position::Before => found,
                _ => (found + 1).min(list.len()),
            }
        }
        None if position.at_start() => 0,
        None => list.len(),
    };
    list.insert(index, id);
}
