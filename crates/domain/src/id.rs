//! ID generation utilities.
//!
//! Entity ids are opaque strings. The indices never mint ids themselves; they
//! take an [`IdGenerator`] so that callers (and tests) decide the scheme.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Identifier of an indexed entity.
pub type Id = String;

/// Source of fresh, unique entity ids.
pub trait IdGenerator: Send + Sync {
    /// Returns an id that has never been returned by this generator.
    fn generate(&self) -> Id;
}

/// Random UUID ids, the default for interactive sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn generate(&self) -> Id {
        Uuid::new_v4().to_string()
    }
}

/// Monotonic `<namespace>-<n>` ids.
///
/// Deterministic, which makes it the generator of choice for tests and for
/// reproducible fixtures.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    namespace: String,
    next: AtomicU64,
}

impl SequentialIdGenerator {
    /// Creates a generator whose first id is `<namespace>-1`.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn generate(&self) -> Id {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{n}", self.namespace)
    }
}

/// Generates a new time-ordered UUID v7 as a string.
#[must_use]
pub fn generate_id() -> Id {
    Uuid::now_v7().to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_format() {
        let id = generate_id();
        assert_eq!(id.len(), 36);
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_uuid_generator_uniqueness() {
        let ids = UuidIdGenerator;
        assert_ne!(ids.generate(), ids.generate());
    }

    #[test]
    fn test_sequential_generator_counts_per_namespace() {
        let ids = SequentialIdGenerator::new("req");
        assert_eq!(ids.generate(), "req-1");
        assert_eq!(ids.generate(), "req-2");

        let other = SequentialIdGenerator::new("scn");
        assert_eq!(other.generate(), "scn-1");
    }
}
