//! Hierarchical ordered index.

use std::collections::{HashMap, HashSet};

use super::{NestedSnapshot, Position, TreeNode, place};
use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};
use crate::id::{Id, IdGenerator};

const TOP_LEVEL: &str = "<top level>";

/// An entity together with its depth in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutlineEntry<'a, T> {
    /// Zero for top-level entities.
    pub depth: usize,
    /// The entity.
    pub entity: &'a T,
}

/// An ordered tree of entities.
///
/// Each id sits either in the top-level list or in exactly one parent's child
/// list, once. A reverse map from child to parent is kept alongside the child
/// lists so that [`NestedIndex::find_parent`] and the upward walks used for
/// parameter inheritance are constant time per step. Containers without
/// children have no child list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedIndex<T> {
    entities: HashMap<Id, T>,
    top_level_ids: Vec<Id>,
    child_ids: HashMap<Id, Vec<Id>>,
    parents: HashMap<Id, Id>,
}

impl<T> Default for NestedIndex<T> {
    fn default() -> Self {
        Self {
            entities: HashMap::new(),
            top_level_ids: Vec::new(),
            child_ids: HashMap::new(),
            parents: HashMap::new(),
        }
    }
}

impl<T: Entity> NestedIndex<T> {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entities at any depth.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if the index holds no entity.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns true if an entity with `id` exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    /// Ids of the roots, in order.
    #[must_use]
    pub fn top_level_ids(&self) -> &[Id] {
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

    /// Applies `update` to a copy of an entity and stores the copy.
    ///
    /// The copy is discarded if `update` changed its id or whether it is a
    /// container, since the tree structure is keyed on both.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no entity has this id and `InvalidValue` if the
    /// update changed the id or the container kind.
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
        if draft.is_container() != current.is_container() {
            return Err(DomainError::InvalidValue(format!(
                "cannot change whether {id} holds children"
            )));
        }
        *current = draft;
        Ok(output)
    }

    /// Looks up an entity for modification.
    ///
    /// Neither the id nor the container kind may be changed through the
    /// returned reference.
    pub(crate) fn get_mut(&mut self, id: &str) -> DomainResult<&mut T> {
        self.entities
            .get_mut(id)
            .ok_or_else(|| DomainError::NotFound(id.to_string()))
    }

    /// Iterates entities mutably, in no particular order.
    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entities.values_mut()
    }

    /// Ordered child ids of `id`; empty for leaves and empty containers.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no entity has this id.
    pub fn children(&self, id: &str) -> DomainResult<&[Id]> {
        if !self.contains(id) {
            return Err(DomainError::NotFound(id.to_string()));
        }
        Ok(self.child_ids.get(id).map_or(&[], Vec::as_slice))
    }

    /// Parent of `id`, or `None` for a top-level entity.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no entity has this id.
    pub fn find_parent(&self, id: &str) -> DomainResult<Option<&str>> {
        if !self.contains(id) {
            return Err(DomainError::NotFound(id.to_string()));
        }
        Ok(self.parents.get(id).map(String::as_str))
    }

    /// Ancestors of `id`, nearest first.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no entity has this id.
    pub fn ancestors(&self, id: &str) -> DomainResult<Vec<&str>> {
        let mut current = self.find_parent(id)?;
        let mut chain = Vec::new();
        while let Some(parent) = current {
            chain.push(parent);
            current = self.parents.get(parent).map(String::as_str);
        }
        Ok(chain)
    }

    /// Returns true if `id` lies strictly below `ancestor`.
    #[must_use]
    pub fn is_descendant(&self, id: &str, ancestor: &str) -> bool {
        let mut current = self.parents.get(id);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.parents.get(parent);
        }
        false
    }

    /// Ids below `id` in depth-first order, excluding `id` itself.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no entity has this id.
    pub fn descendants(&self, id: &str) -> DomainResult<Vec<Id>> {
        if !self.contains(id) {
            return Err(DomainError::NotFound(id.to_string()));
        }
        let mut subtree = self.subtree_ids(id);
        subtree.remove(0);
        Ok(subtree)
    }

    /// Every entity in depth-first order with its depth.
    #[must_use]
    pub fn outline(&self) -> Vec<OutlineEntry<'_, T>> {
        let mut entries = Vec::with_capacity(self.entities.len());
        let mut stack: Vec<(&str, usize)> = self
            .top_level_ids
            .iter()
            .rev()
            .map(|id| (id.as_str(), 0))
            .collect();
        while let Some((id, depth)) = stack.pop() {
            if let Some(entity) = self.entities.get(id) {
                entries.push(OutlineEntry { depth, entity });
            }
            if let Some(children) = self.child_ids.get(id) {
                stack.extend(children.iter().rev().map(|c| (c.as_str(), depth + 1)));
            }
        }
        entries
    }

    /// Iterates entities in depth-first order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.outline().into_iter().map(|entry| entry.entity)
    }

    /// Inserts an entity under `parent` (top level when `None`), before
    /// `before` or at the end of the sibling list.
    ///
    /// # Errors
    ///
    /// - `DuplicateId` if the id is taken.
    /// - `InvalidParent` if the parent is missing or not a container.
    /// - `NotFound` if `before` is missing.
    /// - `InvalidAnchor` if `before` is not a child of `parent`.
    pub fn insert(&mut self, entity: T, parent: Option<&str>, before: Option<&str>) -> DomainResult<()> {
        let id = entity.id().to_string();
        if self.contains(&id) {
            return Err(DomainError::DuplicateId(id));
        }
        if let Some(parent) = parent {
            match self.entities.get(parent) {
                Some(p) if p.is_container() => {}
                _ => return Err(DomainError::InvalidParent(parent.to_string())),
            }
        }
        if let Some(before) = before {
            if !self.contains(before) {
                return Err(DomainError::NotFound(before.to_string()));
            }
            if self.parents.get(before).map(String::as_str) != parent {
                return Err(DomainError::InvalidAnchor {
                    anchor: before.to_string(),
                    parent: parent.unwrap_or(TOP_LEVEL).to_string(),
                });
            }
        }

        let position = if before.is_some() {
            Position::Before
        } else {
            Position::After
        };
        self.attach(id.clone(), parent.map(str::to_string), before, position);
        self.entities.insert(id, entity);
        Ok(())
    }

    /// Inserts an entity relative to `anchor`, with the same placement rules
    /// as [`NestedIndex::move_entity`].
    ///
    /// # Errors
    ///
    /// Returns `DuplicateId` if the id is taken, `NotFound` if the anchor is
    /// missing and `InvalidParent` for an inside placement on a leaf.
    pub fn insert_at(&mut self, entity: T, anchor: Option<&str>, position: Position) -> DomainResult<()> {
        let id = entity.id().to_string();
        if self.contains(&id) {
            return Err(DomainError::DuplicateId(id));
        }
        let parent = self.destination(anchor, position)?;
        self.attach(id.clone(), parent, anchor, position);
        self.entities.insert(id, entity);
        Ok(())
    }

    /// Removes `id` and its whole subtree.
    ///
    /// Returns the removed entities in depth-first order, `id` first.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no entity has this id.
    pub fn remove(&mut self, id: &str) -> DomainResult<Vec<T>> {
        if !self.contains(id) {
            return Err(DomainError::NotFound(id.to_string()));
        }
        let subtree = self.subtree_ids(id);
        self.detach(id);
        let mut removed = Vec::with_capacity(subtree.len());
        for x in &subtree {
            self.child_ids.remove(x);
            self.parents.remove(x);
            if let Some(entity) = self.entities.remove(x) {
                removed.push(entity);
            }
        }
        Ok(removed)
    }

    /// Relocates `id` (with its subtree) relative to `anchor`.
    ///
    /// With no anchor the destination is the top level. The move is a detach
    /// followed by a reinsert, so moving an entity to where it already is
    /// leaves the index unchanged.
    ///
    /// # Errors
    ///
    /// - `NotFound` if `id` or `anchor` is missing.
    /// - `InvalidMove` if `anchor` is `id` or one of its descendants.
    /// - `InvalidParent` for an inside placement on a leaf.
    pub fn move_entity(&mut self, id: &str, anchor: Option<&str>, position: Position) -> DomainResult<()> {
        if !self.contains(id) {
            return Err(DomainError::NotFound(id.to_string()));
        }
        if let Some(anchor) = anchor {
            if !self.contains(anchor) {
                return Err(DomainError::NotFound(anchor.to_string()));
            }
            if anchor == id || self.is_descendant(anchor, id) {
                return Err(DomainError::InvalidMove {
                    id: id.to_string(),
                    destination: anchor.to_string(),
                });
            }
        }
        let parent = self.destination(anchor, position)?;

        self.detach(id);
        self.attach(id.to_string(), parent, anchor, position);
        Ok(())
    }

    /// Deep-copies the subtree rooted at `id` and inserts the copy right after
    /// the original among its siblings.
    ///
    /// Every copied entity gets a fresh id and fresh nested ids; the root
    /// copy is renamed to `<title><suffix>`. All ids are generated and checked
    /// before the index is touched.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no entity has this id and `DuplicateId` if the
    /// generator hands out an id that is already taken.
    pub fn duplicate(&mut self, id: &str, ids: &dyn IdGenerator, suffix: &str) -> DomainResult<Id> {
        let source = self.get(id)?;
        let root_name = format!("{}{suffix}", source.title());
        let subtree = self.subtree_ids(id);

        let mut fresh: HashMap<&str, Id> = HashMap::with_capacity(subtree.len());
        for old in &subtree {
            let new_id = ids.generate();
            if self.contains(&new_id) || fresh.values().any(|x| *x == new_id) {
                return Err(DomainError::DuplicateId(new_id));
            }
            fresh.insert(old.as_str(), new_id);
        }

        let mut copies = Vec::with_capacity(subtree.len());
        for old in &subtree {
            let Some(new_id) = fresh.get(old.as_str()) else {
                continue;
            };
            let mut copy = self.get(old)?.clone();
            copy.set_id(new_id.clone());
            copy.regenerate_nested_ids(ids);
            if old == id {
                copy.set_name(root_name.clone());
            }
            let new_parent = self
                .parents
                .get(old)
                .and_then(|p| fresh.get(p.as_str()))
                .cloned();
            copies.push((new_id.clone(), new_parent, copy));
        }

        let original_parent = self.parents.get(id).cloned();
        let mut copies = copies.into_iter();
        let Some((root_id, _, root)) = copies.next() else {
            return Err(DomainError::NotFound(id.to_string()));
        };
        self.attach(root_id.clone(), original_parent, Some(id), Position::After);
        self.entities.insert(root_id.clone(), root);
        for (new_id, new_parent, copy) in copies {
            if let Some(parent) = new_parent {
                self.child_ids
                    .entry(parent.clone())
                    .or_default()
                    .push(new_id.clone());
                self.parents.insert(new_id.clone(), parent);
            }
            self.entities.insert(new_id, copy);
        }
        Ok(root_id)
    }

    /// A new index holding the ancestor chain of `id` (each ancestor with
    /// only the next one as child) and the full subtree of `id`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no entity has this id.
    pub fn subset(&self, id: &str) -> DomainResult<Self> {
        let mut chain: Vec<&str> = self.ancestors(id)?;
        chain.reverse();

        let mut subset = Self::new();
        let mut parent: Option<&str> = None;
        for ancestor in chain {
            subset.insert(self.get(ancestor)?.clone(), parent, None)?;
            parent = Some(ancestor);
        }
        for x in self.subtree_ids(id) {
            let entity = self.get(&x)?.clone();
            let parent = if x == id {
                parent
            } else {
                self.parents.get(&x).map(String::as_str)
            };
            subset.insert(entity, parent, None)?;
        }
        Ok(subset)
    }

    /// The tree as plain nested nodes, in order.
    #[must_use]
    pub fn to_serializable(&self) -> Vec<TreeNode<T>> {
        self.top_level_ids
            .iter()
            .filter_map(|id| self.tree_node(id))
            .collect()
    }

    /// Rebuilds an index from plain nested nodes, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateId` if two nodes share an id and `InvalidParent` if
    /// a non-container carries children.
    pub fn from_serializable(nodes: Vec<TreeNode<T>>) -> DomainResult<Self> {
        let mut index = Self::new();
        for node in nodes {
            index.load_node(node, None)?;
        }
        Ok(index)
    }

    /// Indexed form of the tree.
    #[must_use]
    pub fn snapshot(&self) -> NestedSnapshot<T> {
        NestedSnapshot {
            top_level_ids: self.top_level_ids.clone(),
            child_ids: self
                .child_ids
                .iter()
                .map(|(id, children)| (id.clone(), children.clone()))
                .collect(),
            entities: self
                .entities
                .iter()
                .map(|(id, entity)| (id.clone(), entity.clone()))
                .collect(),
        }
    }

    /// Rebuilds an index from its indexed form, validating every invariant.
    ///
    /// # Errors
    ///
    /// Returns `InconsistentIndex` on orphans, cycles, dangling or repeated
    /// ids, and children under non-containers.
    pub fn from_snapshot(snapshot: NestedSnapshot<T>) -> DomainResult<Self> {
        let NestedSnapshot {
            top_level_ids,
            child_ids,
            entities,
        } = snapshot;

        let mut parents = HashMap::new();
        for (parent, children) in &child_ids {
            for child in children {
                if parents.insert(child.clone(), parent.clone()).is_some() {
                    return Err(DomainError::InconsistentIndex(format!(
                        "{child} is listed more than once"
                    )));
                }
            }
        }

        let index = Self {
            entities: entities.into_iter().collect(),
            top_level_ids,
            child_ids: child_ids
                .into_iter()
                .filter(|(_, children)| !children.is_empty())
                .collect(),
            parents,
        };
        index.check_invariants()?;
        Ok(index)
    }

    /// Verifies the tree invariants.
    ///
    /// # Errors
    ///
    /// Returns `InconsistentIndex` describing the first violation found.
    pub fn check_invariants(&self) -> DomainResult<()> {
        let inconsistent = |msg: String| -> DomainResult<()> { Err(DomainError::InconsistentIndex(msg)) };

        for id in &self.top_level_ids {
            if self.parents.contains_key(id) {
                return inconsistent(format!("{id} is both a root and a child"));
            }
        }

        let mut visited: HashSet<&str> = HashSet::with_capacity(self.entities.len());
        let mut stack: Vec<&str> = self.top_level_ids.iter().map(String::as_str).collect();
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                return inconsistent(format!("{id} is reachable more than once"));
            }
            let Some(entity) = self.entities.get(id) else {
                return inconsistent(format!("{id} has no entity"));
            };
            if entity.id() != id {
                return inconsistent(format!("{id} is keyed under a different id"));
            }
            if let Some(children) = self.child_ids.get(id) {
                if !entity.is_container() {
                    return inconsistent(format!("{id} has children but is not a container"));
                }
                for child in children {
                    if self.parents.get(child).map(String::as_str) != Some(id) {
                        return inconsistent(format!("{child} has a stale parent link"));
                    }
                    stack.push(child);
                }
            }
        }

        if visited.len() != self.entities.len() {
            return inconsistent("entities unreachable from the top level".to_string());
        }
        if let Some(orphan) = self.child_ids.keys().find(|id| !self.entities.contains_key(*id)) {
            return inconsistent(format!("{orphan} has children but no entity"));
        }
        if self.parents.len() + self.top_level_ids.len() != self.entities.len() {
            return inconsistent("parent links do not match child lists".to_string());
        }
        Ok(())
    }

    fn load_node(&mut self, node: TreeNode<T>, parent: Option<&str>) -> DomainResult<()> {
        let TreeNode { entity, children } = node;
        let id = entity.id().to_string();
        if !children.is_empty() && !entity.is_container() {
            return Err(DomainError::InvalidParent(id));
        }
        self.insert(entity, parent, None)?;
        for child in children {
            self.load_node(child, Some(&id))?;
        }
        Ok(())
    }

    fn tree_node(&self, id: &str) -> Option<TreeNode<T>> {
        let entity = self.entities.get(id)?.clone();
        let children = self
            .child_ids
            .get(id)
            .map(|ids| ids.iter().filter_map(|c| self.tree_node(c)).collect())
            .unwrap_or_default();
        Some(TreeNode::with_children(entity, children))
    }

    /// `id` and everything below it, depth first.
    fn subtree_ids(&self, id: &str) -> Vec<Id> {
        let mut ids = Vec::new();
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(children) = self.child_ids.get(&current) {
                stack.extend(children.iter().rev().cloned());
            }
            ids.push(current);
        }
        ids
    }

    /// Resolves which list an anchored placement lands in.
    fn destination(&self, anchor: Option<&str>, position: Position) -> DomainResult<Option<Id>> {
        let Some(anchor) = anchor else {
            return Ok(None);
        };
        let entity = self.get(anchor)?;
        if position.is_inside() {
            if !entity.is_container() {
                return Err(DomainError::InvalidParent(anchor.to_string()));
            }
            Ok(Some(anchor.to_string()))
        } else {
            Ok(self.parents.get(anchor).cloned())
        }
    }

    fn attach(&mut self, id: Id, parent: Option<Id>, anchor: Option<&str>, position: Position) {
        let list_anchor = if position.is_inside() { None } else { anchor };
        match parent {
            Some(parent) => {
                let siblings = self.child_ids.entry(parent.clone()).or_default();
                place(siblings, id.clone(), list_anchor, position);
                self.parents.insert(id, parent);
            }
            None => place(&mut self.top_level_ids, id, list_anchor, position),
        }
    }

    fn detach(&mut self, id: &str) {
        match self.parents.remove(id) {
            Some(parent) => {
                if let Some(siblings) = self.child_ids.get_mut(&parent) {
                    siblings.retain(|x| x != id);
                    if siblings.is_empty() {
                        self.child_ids.remove(&parent);
                    }
                }
            }
            None => self.top_level_ids.retain(|x| x != id),
        }
    }
}
