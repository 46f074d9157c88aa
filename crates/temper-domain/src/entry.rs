//! Entry module - the record kept for every tracked filesystem path

use crate::RetentionClass;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};

/// Surrogate key assigned by the entry store
///
/// Carries no meaning beyond identifying a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(i64);

impl EntryId {
    /// Wrap a raw key produced by the storage layer
    pub fn from_value(value: i64) -> Self {
        Self(value)
    }

    /// Get the raw key
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tracked filesystem entry (file or directory)
///
/// At most one entry exists for any `(path, class)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedEntry {
    /// Store-assigned key
    pub id: EntryId,

    /// Absolute path of the file or directory
    pub path: PathBuf,

    /// Retention class of the root the path was found under
    pub class: RetentionClass,

    /// When the path was first observed, or last seen reappearing
    pub discovered_at: DateTime<Utc>,
}

impl TrackedEntry {
    /// Whether this entry belongs to the given key
    pub fn is_key(&self, path: &Path, class: RetentionClass) -> bool {
        self.class == class && self.path == path
    }
}

/// An entry that has not been stored yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    /// Absolute path of the file or directory
    pub path: PathBuf,

    /// Retention class of the owning root
    pub class: RetentionClass,

    /// Discovery timestamp
    pub discovered_at: DateTime<Utc>,
}

impl NewEntry {
    /// Create a new entry discovered at `discovered_at`
    pub fn new(path: impl Into<PathBuf>, class: RetentionClass, discovered_at: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            class,
            discovered_at,
        }
    }

    /// Attach the key the store assigned
    pub fn with_id(self, id: EntryId) -> TrackedEntry {
        TrackedEntry {
            id,
            path: self.path,
            class: self.class,
            discovered_at: self.discovered_at,
        }
    }
}
