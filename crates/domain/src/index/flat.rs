//! Flat ordered index.

use std::collections::{HashMap, HashSet};

use super::{FlatSnapshot, Position, place};
use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};
use crate::id::{Id, IdGenerator};

/// An ordered set of entities keyed by id.
///
/// Every id in the order list has exactly one entity and every entity appears
/// exactly once in the order list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedEntities<T> {
    entities: HashMap<Id, T>,
    top_level_ids: Vec<Id>,
}

impl<T> Default for IndexedEntities<T> {
    fn default() -> Self {
        Self {
            entities: HashMap::new(),
            top_level_ids: Vec::new(),
        }
    }
}

impl<T: Entity> IndexedEntities<T> {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.top_level_ids.len()
    }

    /// Returns true if the index holds no entity.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.top_level_ids.is_empty()
    }

    /// Returns true if an entity with `id` exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    /// Entity ids in order.
    #[must_use]
    pub fn ids(&self) -> &[Id] {
        &self.top_level_ids
    }

    /// Looks up an entity.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&T> {
        self.entities.get(id)
    }

    /// Looks up an entity.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no entity has this id.
    pub fn get(&self, id: &str) -> DomainResult<&T> {
        self.entities
            .get(id)
            .ok_or_else(|| DomainError::NotFound(id.to_string()))
    }

    /// Applies `update` to a copy of an entity and stores the copy, unless
    /// the id was changed.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no entity has this id and `InvalidValue` if the
    /// update changed the id.
    pub fn update<R>(&mut self, id: &str, update: impl FnOnce(&mut T) -> R) -> DomainResult<R> {
        let current = self.get_mut(id)?;
        let mut draft = current.clone();
        let output = update(&mut draft);
        if draft.id() != id {
            return Err(DomainError::InvalidValue(format!(
                "cannot change id {id} to {}",
                draft.id()
            )));
        }
        *current = draft;
        Ok(output)
    }

    /// Looks up an entity for modification.
    ///
    /// The id itself must not be changed through the returned reference.
    pub(crate) fn get_mut(&mut self, id: &str) -> DomainResult<&mut T> {
        self.entities
            .get_mut(id)
            .ok_or_else(|| DomainError::NotFound(id.to_string()))
    }

    /// Iterates entities in order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.top_level_ids
            .iter()
            .filter_map(|id| self.entities.get(id))
    }

    /// Iterates entities mutably, in no particular order.
    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entities.values_mut()
    }

    /// Inserts an entity before `before`, or appends it.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateId` if the id is taken and `NotFound` if `before`
    /// is not indexed.
    pub fn insert(&mut self, entity: T, before: Option<&str>) -> DomainResult<()> {
        let id = entity.id().to_string();
        if self.entities.contains_key(&id) {
            return Err(DomainError::DuplicateId(id));
        }
        match before {
            Some(anchor) if !self.contains(anchor) => {
                return Err(DomainError::NotFound(anchor.to_string()));
            }
            Some(anchor) => place(&mut self.top_level_ids, id.clone(), Some(anchor), Position::Before),
            None => self.top_level_ids.push(id.clone()),
        }
        self.entities.insert(id, entity);
        Ok(())
    }

    /// Inserts an entity directly after `after`.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateId` if the id is taken and `NotFound` if `after`
    /// is not indexed.
    pub fn insert_after(&mut self, entity: T, after: &str) -> DomainResult<()> {
        let id = entity.id().to_string();
        if self.entities.contains_key(&id) {
            return Err(DomainError::DuplicateId(id));
        }
        if !self.contains(after) {
            return Err(DomainError::NotFound(after.to_string()));
        }
        place(&mut self.top_level_ids, id.clone(), Some(after), Position::After);
        self.entities.insert(id, entity);
        Ok(())
    }

    /// Removes an entity and returns it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no entity has this id.
    pub fn remove(&mut self, id: &str) -> DomainResult<T> {
        let entity = self
            .entities
            .remove(id)
            .ok_or_else(|| DomainError::NotFound(id.to_string()))?;
        self.top_level_ids.retain(|x| x != id);
        Ok(entity)
    }

    /// Moves an entity before or after `anchor`, or to either end when there
    /// is no anchor.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown ids, `InvalidMove` when `anchor` is the
    /// entity itself and `InvalidParent` for inside placements, which a flat
    /// index cannot honour.
    pub fn move_entity(
        &mut self,
        id: &str,
        anchor: Option<&str>,
        position: Position,
    ) -> DomainResult<()> {
        if !self.contains(id) {
            return Err(DomainError::NotFound(id.to_string()));
        }
        if let Some(anchor) = anchor {
            if !self.contains(anchor) {
                return Err(DomainError::NotFound(anchor.to_string()));
            }
            if anchor == id {
                return Err(DomainError::InvalidMove {
                    id: id.to_string(),
                    destination: anchor.to_string(),
                });
            }
            if position.is_inside() {
                return Err(DomainError::InvalidParent(anchor.to_string()));
            }
        }

        self.top_level_ids.retain(|x| x != id);
        place(&mut self.top_level_ids, id.to_string(), anchor, position);
        Ok(())
    }

    /// Clones an entity under a fresh id, appends `suffix` to its title and
    /// inserts the clone right after the original.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no entity has this id and `DuplicateId` if the
    /// generator hands out a taken id.
    pub fn duplicate(&mut self, id: &str, ids: &dyn IdGenerator, suffix: &str) -> DomainResult<Id> {
        let source = self.get(id)?;
        let mut copy = source.clone();
        let name = format!("{}{suffix}", source.title());
        let new_id = ids.generate();
        copy.set_id(new_id.clone());
        copy.set_name(name);
        copy.regenerate_nested_ids(ids);
        self.insert_after(copy, id)?;
        Ok(new_id)
    }

    /// Entities in order, ready to serialize as a plain list.
    #[must_use]
    pub fn to_serializable(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    /// Rebuilds an index from a plain list, keeping its order.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateId` if two entities share an id.
    pub fn from_serializable(entities: Vec<T>) -> DomainResult<Self> {
        let mut index = Self::new();
        for entity in entities {
            index.insert(entity, None)?;
        }
        Ok(index)
    }

    /// Indexed form of the collection.
    #[must_use]
    pub fn snapshot(&self) -> FlatSnapshot<T> {
        FlatSnapshot {
            top_level_ids: self.top_level_ids.clone(),
            entities: self
                .entities
                .iter()
                .map(|(id, entity)| (id.clone(), entity.clone()))
                .collect(),
        }
    }

    /// Rebuilds an index from its indexed form.
    ///
    /// # Errors
    ///
    /// Returns `InconsistentIndex` when the order list and the entity map
    /// disagree.
    pub fn from_snapshot(snapshot: FlatSnapshot<T>) -> DomainResult<Self> {
        let FlatSnapshot {
            top_level_ids,
            entities,
        } = snapshot;
        let index = Self {
            entities: entities.into_iter().collect(),
            top_level_ids,
        };
        index.check_invariants()?;
        Ok(index)
    }

    /// Verifies that the order list and the entity map describe the same set.
    ///
    /// # Errors
    ///
    /// Returns `InconsistentIndex` describing the first violation found.
    pub fn check_invariants(&self) -> DomainResult<()> {
        let mut seen = HashSet::new();
        for id in &self.top_level_ids {
            if !seen.insert(id.as_str()) {
                return Err(DomainError::InconsistentIndex(format!("{id} is listed twice")));
            }
            match self.entities.get(id) {
                None => {
                    return Err(DomainError::InconsistentIndex(format!("{id} has no entity")));
                }
                Some(entity) if entity.id() != id => {
                    return Err(DomainError::InconsistentIndex(format!(
                        "{id} is keyed under a different id"
                    )));
                }
                Some(_) => {}
            }
        }
        if seen.len() != self.entities.len() {
            return Err(DomainError::InconsistentIndex(
                "entities missing from the order list".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::entity::test_support::Node;
    use crate::id::SequentialIdGenerator;

    fn index_of(ids: &[&str]) -> IndexedEntities<Node> {
        IndexedEntities::from_serializable(ids.iter().map(|id| Node::leaf(id)).collect()).unwrap()
    }

    fn order(index: &IndexedEntities<Node>) -> Vec<&str> {
        index.ids().iter().map(String::as_str).collect()
    }

    #[test]
    fn test_insert_before_and_append() {
        let mut index = index_of(&["a", "c"]);
        index.insert(Node::leaf("b"), Some("c")).unwrap();
        index.insert(Node::leaf("d"), None).unwrap();

        assert_eq!(order(&index), vec!["a", "b", "c", "d"]);
        index.check_invariants().unwrap();
    }

    #[test]
    fn test_insert_rejects_duplicates_and_unknown_anchor() {
        let mut index = index_of(&["a"]);
        assert_eq!(
            index.insert(Node::leaf("a"), None),
            Err(DomainError::DuplicateId("a".to_string()))
        );
        assert_eq!(
            index.insert(Node::leaf("b"), Some("zz")),
            Err(DomainError::NotFound("zz".to_string()))
        );
        assert_eq!(order(&index), vec!["a"]);
    }

    #[test]
    fn test_remove() {
        let mut index = index_of(&["a", "b", "c"]);
        let removed = index.remove("b").unwrap();

        assert_eq!(removed.id, "b");
        assert_eq!(order(&index), vec!["a", "c"]);
        assert!(index.remove("b").is_err());
    }

    #[test]
    fn test_move_before_after_and_edges() {
        let mut index = index_of(&["a", "b", "c", "d"]);

        index.move_entity("d", Some("b"), Position::Before).unwrap();
        assert_eq!(order(&index), vec!["a", "d", "b", "c"]);

        index.move_entity("a", Some("c"), Position::After).unwrap();
        assert_eq!(order(&index), vec!["d", "b", "c", "a"]);

        index.move_entity("c", None, Position::Before).unwrap();
        assert_eq!(order(&index), vec!["c", "d", "b", "a"]);

        index.move_entity("c", None, Position::LastChild).unwrap();
        assert_eq!(order(&index), vec!["d", "b", "a", "c"]);
    }

    #[test]
    fn test_move_to_current_position_is_identity() {
        let mut index = index_of(&["a", "b", "c"]);
        let before = index.clone();

        index.move_entity("b", Some("a"), Position::After).unwrap();
        assert_eq!(index, before);
        index.move_entity("b", Some("c"), Position::Before).unwrap();
        assert_eq!(index, before);
    }

    #[test]
    fn test_move_rejections_leave_index_untouched() {
        let mut index = index_of(&["a", "b"]);
        let before = index.clone();

        assert!(matches!(
            index.move_entity("a", Some("a"), Position::After),
            Err(DomainError::InvalidMove { .. })
        ));
        assert!(matches!(
            index.move_entity("a", Some("b"), Position::FirstChild),
            Err(DomainError::InvalidParent(_))
        ));
        assert!(matches!(
            index.move_entity("zz", None, Position::After),
            Err(DomainError::NotFound(_))
        ));
        assert_eq!(index, before);
    }

    #[test]
    fn test_duplicate_inserts_after_source_with_fresh_ids() {
        let ids = SequentialIdGenerator::new("copy");
        let mut index = IndexedEntities::new();
        let mut tagged = Node::leaf("a");
        tagged.tag = Some("tag-a".to_string());
        index.insert(tagged, None).unwrap();
        index.insert(Node::leaf("b"), None).unwrap();

        let new_id = index.duplicate("a", &ids, " - Copy").unwrap();

        assert_eq!(order(&index), vec!["a", new_id.as_str(), "b"]);
        let copy = index.get(&new_id).unwrap();
        assert_eq!(copy.name, "A - Copy");
        assert_ne!(copy.tag.as_deref(), Some("tag-a"));
        assert!(copy.tag.is_some());
    }

    #[test]
    fn test_duplicate_of_last_entity_appends() {
        let ids = SequentialIdGenerator::new("copy");
        let mut index = index_of(&["a", "b"]);

        let new_id = index.duplicate("b", &ids, " - Copy").unwrap();
        assert_eq!(order(&index), vec!["a", "b", new_id.as_str()]);
    }

    #[test]
    fn test_duplicate_of_unnamed_entity_uses_placeholder_title() {
        let ids = SequentialIdGenerator::new("copy");
        let mut node = Node::leaf("a");
        node.name.clear();
        let mut index = IndexedEntities::from_serializable(vec![node]).unwrap();

        let new_id = index.duplicate("a", &ids, " - Copy").unwrap();
        assert_eq!(index.get(&new_id).unwrap().name, "(Unnamed) - Copy");
    }

    #[test]
    fn test_snapshot_round_trip_and_validation() {
        let index = index_of(&["b", "a"]);
        let restored = IndexedEntities::from_snapshot(index.snapshot()).unwrap();
        assert_eq!(restored, index);

        let mut broken = index.snapshot();
        broken.top_level_ids.push("ghost".to_string());
        assert!(matches!(
            IndexedEntities::from_snapshot(broken),
            Err(DomainError::InconsistentIndex(_))
        ));

        let mut orphaned = index.snapshot();
        orphaned.top_level_ids.pop();
        assert!(IndexedEntities::from_snapshot(orphaned).is_err());
    }

    #[test]
    fn test_from_serializable_rejects_duplicates() {
        let result = IndexedEntities::from_serializable(vec![Node::leaf("a"), Node::leaf("a")]);
        assert_eq!(result, Err(DomainError::DuplicateId("a".to_string())));
    }

    #[test]
    fn test_update_keeps_id() {
        let mut index = index_of(&["a", "b"]);
        index.update("a", |node| node.name = "Alpha".into()).unwrap();
        assert_eq!(index.get("a").unwrap().name, "Alpha");

        let result = index.update("b", |node| node.id = "a".into());
        assert!(matches!(result, Err(DomainError::InvalidValue(_))));
        assert_eq!(index.get("b").unwrap().id, "b");
        assert_eq!(order(&index), vec!["a", "b"]);
        index.check_invariants().unwrap();
    }
}
