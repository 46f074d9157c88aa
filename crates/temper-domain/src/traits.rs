//! Trait definitions for external interactions
//!
//! These traits define the boundary between the domain and the persistence
//! engine. Implementations live in other crates.

use crate::{EntryId, NewEntry, RetentionClass, TrackedEntry};
use std::path::PathBuf;

/// Trait for storing and retrieving tracked entries
///
/// Implemented by the infrastructure layer (temper-store). Implementations are
/// responsible for durability and must report failures as errors, distinct from
/// the `Ok(None)` of a lookup that found nothing.
pub trait EntryStore {
    /// Error type for store operations
    type Error;

    /// Insert a new entry, returning its assigned key
    fn insert(&mut self, entry: NewEntry) -> Result<EntryId, Self::Error>;

    /// Overwrite a stored entry, matched by its key
    fn update(&mut self, entry: &TrackedEntry) -> Result<(), Self::Error>;

    /// Delete an entry by key
    fn delete(&mut self, id: EntryId) -> Result<(), Self::Error>;

    /// Get the first entry matching the query
    fn find_one(&self, query: &EntryQuery) -> Result<Option<TrackedEntry>, Self::Error>;

    /// Get every stored entry
    fn list_all(&self) -> Result<Vec<TrackedEntry>, Self::Error>;
}

/// Query criteria for looking up entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryQuery {
    /// Filter by exact path
    pub path: Option<PathBuf>,

    /// Filter by retention class
    pub class: Option<RetentionClass>,
}

impl EntryQuery {
    /// Query for the single entry owning a `(path, class)` key
    pub fn key(path: impl Into<PathBuf>, class: RetentionClass) -> Self {
        Self {
            path: Some(path.into()),
            class: Some(class),
        }
    }

    /// Whether an entry satisfies every criterion of this query
    pub fn matches(&self, entry: &TrackedEntry) -> bool {
        self.path.as_ref().is_none_or(|p| *p == entry.path)
            && self.class.is_none_or(|c| c == entry.class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn entry(path: &str, class: RetentionClass) -> TrackedEntry {
        NewEntry::new(path, class, Utc.timestamp_opt(1_700_000_000, 0).unwrap())
            .with_id(EntryId::from_value(1))
    }

    #[test]
    fn test_empty_query_matches_everything() {
        let query = EntryQuery::default();
        assert!(query.matches(&entry("/tmp/a", RetentionClass::Daily)));
        assert!(query.matches(&entry("/tmp/b", RetentionClass::Monthly)));
    }

    #[test]
    fn test_key_query_rejects_other_class() {
        let query = EntryQuery::key("/tmp/a", RetentionClass::Daily);
        assert!(query.matches(&entry("/tmp/a", RetentionClass::Daily)));
        assert!(!query.matches(&entry("/tmp/a", RetentionClass::Weekly)));
        assert!(!query.matches(&entry("/tmp/b", RetentionClass::Daily)));
    }

    proptest! {
        #[test]
        fn key_query_matches_only_its_own_key(
            a in "[a-z]{1,8}",
            b in "[a-z]{1,8}",
            class_idx in 0usize..3,
        ) {
            let class = RetentionClass::ALL[class_idx];
            let query = EntryQuery::key(format!("/root/{a}"), class);
            let candidate = entry(&format!("/root/{b}"), class);
            prop_assert_eq!(query.matches(&candidate), a == b);
        }
    }
}
