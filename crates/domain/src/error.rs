//! Domain error types

use thiserror::Error;

/// Domain-level errors raised by the entity indices, the resolver and the
/// execution tracker.
///
/// Every operation that returns one of these leaves the state it was called
/// on untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// No entity or execution exists with the given id.
    #[error("entity not found: {0}")]
    NotFound(String),

    /// An entity with the given id is already indexed.
    #[error("duplicate entity id: {0}")]
    DuplicateId(String),

    /// The requested parent does not exist or cannot hold children.
    #[error("invalid parent: {0}")]
    InvalidParent(String),

    /// The insertion anchor is not a child of the requested parent.
    #[error("anchor {anchor} is not a child of {parent}")]
    InvalidAnchor {
        /// Id the entity was supposed to be placed before.
        anchor: String,
        /// Parent the anchor was looked up in (`<top level>` for roots).
        parent: String,
    },

    /// The move would place an entity inside itself or one of its descendants.
    #[error("cannot move {id} relative to {destination}")]
    InvalidMove {
        /// Id of the entity being moved.
        id: String,
        /// Destination anchor that was rejected.
        destination: String,
    },

    /// A serialized index violates the tree invariants.
    #[error("inconsistent index: {0}")]
    InconsistentIndex(String),

    /// A run, result or panel selection does not exist.
    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    /// A field value is outside its allowed range.
    #[error("invalid value: {0}")]
    InvalidValue(String),
}

/// Result type alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
