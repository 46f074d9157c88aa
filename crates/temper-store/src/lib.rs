//! Temper Storage Layer
//!
//! Implements the EntryStore trait on top of SQLite.
//!
//! # Architecture
//!
//! - One `tracked_entries` table keyed by an autoincrement id
//! - Uniqueness constraint on `(path, retention_class)`
//! - Paths stored as raw bytes, so any name the OS accepts round-trips
//! - Retention classes stored by name, timestamps as Unix milliseconds (UTC)
//!
//! # Examples
//!
//! ```no_run
//! use temper_store::SqliteStore;
//!
//! let store = SqliteStore::new("temper.sqlite").unwrap();
//! // Store is now ready for entry operations
//! ```

#![warn(missing_docs)]

use chrono::{DateTime, Utc};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use temper_domain::{EntryId, EntryQuery, EntryStore, NewEntry, RetentionClass, TrackedEntry};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

const SELECT_ENTRIES: &str =
    "SELECT id, path, retention_class, discovered_at FROM tracked_entries";

/// SQLite-based implementation of EntryStore
///
/// # Thread Safety
///
/// SQLite connections are not thread-safe. Share a store between threads only
/// behind a lock, the way the agent's path tracker does.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a store at the given database path
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use temper_store::SqliteStore;
    ///
    /// let store = SqliteStore::new("temper.sqlite").unwrap();
    /// ```
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        tracing::debug!("Opened entry store at {}", path.as_ref().display());
        let mut store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open a private in-memory store
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::new(":memory:")
    }

    /// Initialize the database schema
    fn initialize_schema(&mut self) -> Result<(), StoreError> {
        let schema = include_str!("schema.sql");
        self.conn.execute_batch(schema)?;
        Ok(())
    }

    #[cfg(unix)]
    fn path_to_bytes(path: &Path) -> Cow<'_, [u8]> {
        use std::os::unix::ffi::OsStrExt;
        Cow::Borrowed(path.as_os_str().as_bytes())
    }

    #[cfg(not(unix))]
    fn path_to_bytes(path: &Path) -> Cow<'_, [u8]> {
        match path.to_string_lossy() {
            Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
            Cow::Owned(s) => Cow::Owned(s.into_bytes()),
        }
    }

    #[cfg(unix)]
    fn bytes_to_path(bytes: &[u8]) -> PathBuf {
        use std::os::unix::ffi::OsStrExt;
        PathBuf::from(std::ffi::OsStr::from_bytes(bytes))
    }

    #[cfg(not(unix))]
    fn bytes_to_path(bytes: &[u8]) -> PathBuf {
        PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
    }

    fn column_to_path(row: &Row<'_>, idx: usize) -> rusqlite::Result<PathBuf> {
        match row.get_ref(idx)? {
            ValueRef::Blob(bytes) | ValueRef::Text(bytes) => Ok(Self::bytes_to_path(bytes)),
            other => Err(rusqlite::Error::InvalidColumnType(
                idx,
                "path".to_string(),
                other.data_type(),
            )),
        }
    }

    fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>, StoreError> {
        DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| StoreError::InvalidData(format!("Timestamp out of range: {}", millis)))
    }

    fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<TrackedEntry> {
        let class_str: String = row.get(2)?;
        let class = RetentionClass::parse(&class_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                Box::new(StoreError::InvalidData(format!("Unknown retention class: {}", class_str))),
            )
        })?;

        let discovered_at = Self::millis_to_datetime(row.get(3)?).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Integer, Box::new(e))
        })?;

        Ok(TrackedEntry {
            id: EntryId::from_value(row.get(0)?),
            path: Self::column_to_path(row, 1)?,
            class,
            discovered_at,
        })
    }
}

impl EntryStore for SqliteStore {
    type Error = StoreError;

    fn insert(&mut self, entry: NewEntry) -> Result<EntryId, Self::Error> {
        self.conn.execute(
            "INSERT INTO tracked_entries (path, retention_class, discovered_at)
             VALUES (?1, ?2, ?3)",
            params![
                Self::path_to_bytes(&entry.path).as_ref(),
                entry.class.as_str(),
                entry.discovered_at.timestamp_millis(),
            ],
        )?;

        Ok(EntryId::from_value(self.conn.last_insert_rowid()))
    }

    fn update(&mut self, entry: &TrackedEntry) -> Result<(), Self::Error> {
        let changed = self.conn.execute(
            "UPDATE tracked_entries SET path = ?1, retention_class = ?2, discovered_at = ?3
             WHERE id = ?4",
            params![
                Self::path_to_bytes(&entry.path).as_ref(),
                entry.class.as_str(),
                entry.discovered_at.timestamp_millis(),
                entry.id.value(),
            ],
        )?;

        if changed == 0 {
            return Err(StoreError::InvalidData(format!("No entry with id {}", entry.id)));
        }
        Ok(())
    }

    fn delete(&mut self, id: EntryId) -> Result<(), Self::Error> {
        self.conn
            .execute("DELETE FROM tracked_entries WHERE id = ?1", params![id.value()])?;
        Ok(())
    }

    fn find_one(&self, query: &EntryQuery) -> Result<Option<TrackedEntry>, Self::Error> {
        let mut sql = format!("{} WHERE 1=1", SELECT_ENTRIES);
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(path) = &query.path {
            sql.push_str(" AND path = ?");
            params.push(Box::new(Self::path_to_bytes(path).into_owned()));
        }

        if let Some(class) = query.class {
            sql.push_str(" AND retention_class = ?");
            params.push(Box::new(class.as_str()));
        }

        sql.push_str(" ORDER BY id LIMIT 1");

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let entry = self
            .conn
            .query_row(&sql, &param_refs[..], Self::row_to_entry)
            .optional()?;

        Ok(entry)
    }

    fn list_all(&self) -> Result<Vec<TrackedEntry>, Self::Error> {
        let mut stmt = self.conn.prepare(&format!("{} ORDER BY id", SELECT_ENTRIES))?;
        let entries = stmt
            .query_map([], Self::row_to_entry)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }
}
