//! The contract every indexed record fulfils.

use crate::id::{Id, IdGenerator};

/// Title shown for entities whose name is empty.
pub const UNNAMED: &str = "(Unnamed)";

/// A record stored in a flat or nested index.
///
/// Entities are plain values: the index owns them and hands out references.
/// Containment is decided by [`Entity::is_container`], so a single nested
/// index can hold both groups and requests.
pub trait Entity: Clone {
    /// Unique id of the entity.
    fn id(&self) -> &str;

    /// Replaces the id. Only the indices call this, when cloning subtrees.
    fn set_id(&mut self, id: Id);

    /// Display name as entered by the user; may be empty.
    fn name(&self) -> &str;

    /// Replaces the display name.
    fn set_name(&mut self, name: String);

    /// Whether the entity may hold children in a nested index.
    fn is_container(&self) -> bool {
        false
    }

    /// Assigns fresh ids to identifiers nested inside the entity
    /// (header rows, variables, form fields).
    fn regenerate_nested_ids(&mut self, _ids: &dyn IdGenerator) {}

    /// Name, or [`UNNAMED`] when the name is empty.
    fn title(&self) -> &str {
        let name = self.name();
        if name.is_empty() { UNNAMED } else { name }
    }

    /// Every nested identifier owned by the entity.
    fn nested_ids(&self) -> Vec<&str> {
        Vec::new()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Minimal entity used by the index tests.

    use serde::{Deserialize, Serialize};

    use super::Entity;
    use crate::id::{Id, IdGenerator};

    /// Test entity: a folder when `folder` is set, a leaf otherwise.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Node {
        pub id: Id,
        pub name: String,
        #[serde(default)]
        pub folder: bool,
        #[serde(default)]
        pub tag: Option<Id>,
    }

    impl Node {
        pub fn leaf(id: &str) -> Self {
            Self {
                id: id.to_string(),
                name: id.to_uppercase(),
                folder: false,
                tag: None,
            }
        }

        pub fn folder(id: &str) -> Self {
            Self {
                folder: true,
                ..Self::leaf(id)
            }
        }
    }

    impl Entity for Node {
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

        fn is_container(&self) -> bool {
            self.folder
        }

        fn regenerate_nested_ids(&mut self, ids: &dyn IdGenerator) {
            if self.tag.is_some() {
                self.tag = Some(ids.generate());
            }
        }

        fn nested_ids(&self) -> Vec<&str> {
            self.tag.as_deref().into_iter().collect()
        }
    }
}
