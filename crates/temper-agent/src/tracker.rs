//! Path tracker: the single mutator of tracked entries
//!
//! Every operation takes the store lock for its whole read-modify-write, so
//! watcher tasks and the sweeper never observe half of another call.

use crate::AgentError;
use chrono::{DateTime, Utc};
use std::fmt::Display;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use temper_domain::{EntryQuery, EntryStore, NewEntry, RetentionClass, TrackedEntry};

/// What an upsert did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// A new entry was created
    Inserted,
    /// An existing entry had its discovery time refreshed
    Refreshed,
}

/// Serialized access point to the entry store
///
/// Enforces one entry per `(path, class)` and is shared by all watchers and
/// the sweeper behind an `Arc`.
///
/// # Examples
///
/// ```
/// use temper_agent::PathTracker;
/// use temper_domain::RetentionClass;
/// use temper_store::SqliteStore;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let tracker = PathTracker::new(SqliteStore::in_memory()?);
/// tracker.upsert("/srv/temp/daily/report.txt".as_ref(), RetentionClass::Daily)?;
/// tracker.upsert("/srv/temp/daily/report.txt".as_ref(), RetentionClass::Daily)?;
/// assert_eq!(tracker.list_all()?.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct PathTracker<S> {
    store: Mutex<S>,
}

impl<S> PathTracker<S>
where
    S: EntryStore,
    S::Error: Display,
{
    /// Wrap a store; the tracker becomes its only user
    pub fn new(store: S) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, S>, AgentError> {
        self.store
            .lock()
            .map_err(|_| AgentError::Storage("entry store lock poisoned".into()))
    }

    fn storage_error(op: &str, path: &Path, class: RetentionClass, err: S::Error) -> AgentError {
        AgentError::Storage(format!("{} {} [{}]: {}", op, path.display(), class, err))
    }

    /// Track `path` under `class`, refreshing its discovery time if already tracked
    pub fn upsert(&self, path: &Path, class: RetentionClass) -> Result<Upsert, AgentError> {
        self.upsert_at(path, class, Utc::now())
    }

    /// Like [`upsert`](Self::upsert) with an explicit discovery time
    pub fn upsert_at(
        &self,
        path: &Path,
        class: RetentionClass,
        at: DateTime<Utc>,
    ) -> Result<Upsert, AgentError> {
        let mut store = self.lock()?;
        let existing = store
            .find_one(&EntryQuery::key(path, class))
            .map_err(|e| Self::storage_error("find", path, class, e))?;

        let outcome = match existing {
            Some(mut entry) => {
                entry.discovered_at = at;
                store
                    .update(&entry)
                    .map_err(|e| Self::storage_error("refresh", path, class, e))?;
                Upsert::Refreshed
            }
            None => {
                store
                    .insert(NewEntry::new(path, class, at))
                    .map_err(|e| Self::storage_error("insert", path, class, e))?;
                Upsert::Inserted
            }
        };
        drop(store);

        match outcome {
            Upsert::Inserted => tracing::info!("[{}] Added new entry: {}", class, path.display()),
            Upsert::Refreshed => tracing::debug!("[{}] Refreshed entry: {}", class, path.display()),
        }
        Ok(outcome)
    }

    /// Track `path` only if it is not tracked yet; returns whether it was added
    pub fn insert_if_absent(&self, path: &Path, class: RetentionClass) -> Result<bool, AgentError> {
        let mut store = self.lock()?;
        let existing = store
            .find_one(&EntryQuery::key(path, class))
            .map_err(|e| Self::storage_error("find", path, class, e))?;
        if existing.is_some() {
            return Ok(false);
        }

        store
            .insert(NewEntry::new(path, class, Utc::now()))
            .map_err(|e| Self::storage_error("insert", path, class, e))?;
        Ok(true)
    }

    /// Stop tracking `path` under `class`; returns whether an entry existed
    pub fn remove(&self, path: &Path, class: RetentionClass) -> Result<bool, AgentError> {
        let mut store = self.lock()?;
        let Some(entry) = store
            .find_one(&EntryQuery::key(path, class))
            .map_err(|e| Self::storage_error("find", path, class, e))?
        else {
            return Ok(false);
        };

        store
            .delete(entry.id)
            .map_err(|e| Self::storage_error("delete", path, class, e))?;
        drop(store);

        tracing::info!("[{}] Removed entry: {}", class, path.display());
        Ok(true)
    }

    /// Stop tracking `entry` only if its stored record still matches the snapshot
    ///
    /// Returns `false` when the key was removed, re-created or refreshed since
    /// the snapshot was taken; the newer record is left alone.
    pub fn remove_if_unchanged(&self, entry: &TrackedEntry) -> Result<bool, AgentError> {
        let (path, class) = (entry.path.as_path(), entry.class);
        let mut store = self.lock()?;
        let current = store
            .find_one(&EntryQuery::key(path, class))
            .map_err(|e| Self::storage_error("find", path, class, e))?;

        match current {
            Some(current) if current.id == entry.id && current.discovered_at == entry.discovered_at => {
                store
                    .delete(current.id)
                    .map_err(|e| Self::storage_error("delete", path, class, e))?;
            }
            _ => return Ok(false),
        }
        drop(store);

        tracing::info!("[{}] Removed entry: {}", class, path.display());
        Ok(true)
    }

    /// Look up the entry for a key
    pub fn find(&self, path: &Path, class: RetentionClass) -> Result<Option<TrackedEntry>, AgentError> {
        self.lock()?
            .find_one(&EntryQuery::key(path, class))
            .map_err(|e| Self::storage_error("find", path, class, e))
    }

    /// Snapshot of every tracked entry
    pub fn list_all(&self) -> Result<Vec<TrackedEntry>, AgentError> {
        self.lock()?
            .list_all()
            .map_err(|e| AgentError::Storage(format!("list entries: {}", e)))
    }

    /// Number of tracked entries
    pub fn len(&self) -> Result<usize, AgentError> {
        Ok(self.list_all()?.len())
    }

    /// Whether nothing is tracked
    pub fn is_empty(&self) -> Result<bool, AgentError> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::Arc;
    use temper_domain::EntryId;
    use temper_store::SqliteStore;

    // Mock store for testing; `fail` makes every call error out
    #[derive(Default)]
    pub(crate) struct MockStore {
        pub(crate) entries: Vec<TrackedEntry>,
        pub(crate) next_id: i64,
        pub(crate) fail: bool,
    }

    impl MockStore {
        pub(crate) fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn check(&self) -> Result<(), String> {
            if self.fail {
                Err("store unavailable".to_string())
            } else {
                Ok(())
            }
        }
    }

    impl EntryStore for MockStore {
        type Error = String;

        fn insert(&mut self, entry: NewEntry) -> Result<EntryId, Self::Error> {
            self.check()?;
            if self.entries.iter().any(|e| e.is_key(&entry.path, entry.class)) {
                return Err("UNIQUE constraint failed".to_string());
            }
            self.next_id += 1;
            let id = EntryId::from_value(self.next_id);
            self.entries.push(entry.with_id(id));
            Ok(id)
        }

        fn update(&mut self, entry: &TrackedEntry) -> Result<(), Self::Error> {
            self.check()?;
            let slot = self
                .entries
                .iter_mut()
                .find(|e| e.id == entry.id)
                .ok_or_else(|| "no such entry".to_string())?;
            *slot = entry.clone();
            Ok(())
        }

        fn delete(&mut self, id: EntryId) -> Result<(), Self::Error> {
            self.check()?;
            self.entries.retain(|e| e.id != id);
            Ok(())
        }

        fn find_one(&self, query: &EntryQuery) -> Result<Option<TrackedEntry>, Self::Error> {
            self.check()?;
            Ok(self.entries.iter().find(|e| query.matches(e)).cloned())
        }

        fn list_all(&self) -> Result<Vec<TrackedEntry>, Self::Error> {
            self.check()?;
            Ok(self.entries.clone())
        }
    }

    #[test]
    fn test_upsert_inserts_then_refreshes() {
        let tracker = PathTracker::new(MockStore::default());
        let path = Path::new("/srv/temp/daily/report.txt");
        let first = Utc::now() - Duration::hours(5);

        assert_eq!(tracker.upsert_at(path, RetentionClass::Daily, first).unwrap(), Upsert::Inserted);
        assert_eq!(tracker.upsert(path, RetentionClass::Daily).unwrap(), Upsert::Refreshed);

        let entries = tracker.list_all().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].discovered_at > first);
    }

    #[test]
    fn test_same_path_in_two_classes() {
        let tracker = PathTracker::new(MockStore::default());
        let path = Path::new("/srv/shared");
        tracker.upsert(path, RetentionClass::Daily).unwrap();
        tracker.upsert(path, RetentionClass::Weekly).unwrap();
        assert_eq!(tracker.len().unwrap(), 2);

        assert!(tracker.remove(path, RetentionClass::Daily).unwrap());
        assert!(tracker.find(path, RetentionClass::Daily).unwrap().is_none());
        assert!(tracker.find(path, RetentionClass::Weekly).unwrap().is_some());
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let tracker = PathTracker::new(MockStore::default());
        assert!(!tracker.remove(Path::new("/nowhere"), RetentionClass::Monthly).unwrap());
        assert!(tracker.is_empty().unwrap());
    }

    #[test]
    fn test_insert_if_absent_keeps_timestamp() {
        let tracker = PathTracker::new(MockStore::default());
        let path = Path::new("/srv/temp/weekly/a");
        let at = Utc::now() - Duration::hours(30);
        tracker.upsert_at(path, RetentionClass::Weekly, at).unwrap();

        assert!(!tracker.insert_if_absent(path, RetentionClass::Weekly).unwrap());
        let entry = tracker.find(path, RetentionClass::Weekly).unwrap().unwrap();
        assert_eq!(entry.discovered_at, at);

        assert!(tracker.insert_if_absent(Path::new("/srv/temp/weekly/b"), RetentionClass::Weekly).unwrap());
        assert_eq!(tracker.len().unwrap(), 2);
    }

    #[test]
    fn test_remove_if_unchanged_spares_newer_records() {
        let tracker = PathTracker::new(MockStore::default());
        let path = Path::new("/srv/temp/daily/report.txt");
        tracker
            .upsert_at(path, RetentionClass::Daily, Utc::now() - Duration::hours(2))
            .unwrap();
        let snapshot = tracker.find(path, RetentionClass::Daily).unwrap().unwrap();

        // Refreshed after the snapshot
        tracker.upsert(path, RetentionClass::Daily).unwrap();
        assert!(!tracker.remove_if_unchanged(&snapshot).unwrap());
        assert!(tracker.find(path, RetentionClass::Daily).unwrap().is_some());

        // Removed and tracked again under a new id
        let refreshed = tracker.find(path, RetentionClass::Daily).unwrap().unwrap();
        tracker.remove(path, RetentionClass::Daily).unwrap();
        tracker.upsert_at(path, RetentionClass::Daily, refreshed.discovered_at).unwrap();
        assert!(!tracker.remove_if_unchanged(&refreshed).unwrap());

        let current = tracker.find(path, RetentionClass::Daily).unwrap().unwrap();
        assert!(tracker.remove_if_unchanged(&current).unwrap());
        assert!(tracker.is_empty().unwrap());
        assert!(!tracker.remove_if_unchanged(&current).unwrap());
    }

    #[test]
    fn test_storage_errors_propagate() {
        let tracker = PathTracker::new(MockStore::failing());
        let err = tracker.upsert(Path::new("/srv/a"), RetentionClass::Daily).unwrap_err();
        assert!(matches!(err, AgentError::Storage(ref msg) if msg.contains("/srv/a")));
        assert!(tracker.remove(Path::new("/srv/a"), RetentionClass::Daily).is_err());
        assert!(tracker.list_all().is_err());
    }

    #[test]
    fn test_concurrent_disjoint_mutations() {
        let tracker = Arc::new(PathTracker::new(SqliteStore::in_memory().unwrap()));

        std::thread::scope(|scope| {
            for worker in 0..8 {
                let tracker = Arc::clone(&tracker);
                scope.spawn(move || {
                    for i in 0..25 {
                        let path = PathBuf::from(format!("/srv/temp/daily/w{worker}/f{i}"));
                        tracker.upsert(&path, RetentionClass::Daily).unwrap();
                        tracker.upsert(&path, RetentionClass::Daily).unwrap();
                        if i % 2 == 1 {
                            tracker.remove(&path, RetentionClass::Daily).unwrap();
                        }
                    }
                });
            }
        });

        let actual: HashSet<PathBuf> = tracker.list_all().unwrap().into_iter().map(|e| e.path).collect();
        let expected: HashSet<PathBuf> = (0..8)
            .flat_map(|w| (0..25).step_by(2).map(move |i| PathBuf::from(format!("/srv/temp/daily/w{w}/f{i}"))))
            .collect();
        assert_eq!(tracker.len().unwrap(), expected.len());
        assert_eq!(actual, expected);
    }

    proptest! {
        #[test]
        fn upsert_sequences_keep_one_entry_per_key(
            ops in proptest::collection::vec((0usize..4, 0usize..3, any::<bool>()), 1..40)
        ) {
            let tracker = PathTracker::new(MockStore::default());
            let mut model: HashSet<(usize, usize)> = HashSet::new();

            for (file, class_idx, is_upsert) in ops {
                let path = PathBuf::from(format!("/srv/f{file}"));
                let class = RetentionClass::ALL[class_idx];
                if is_upsert {
                    tracker.upsert(&path, class).unwrap();
                    model.insert((file, class_idx));
                } else {
                    tracker.remove(&path, class).unwrap();
                    model.remove(&(file, class_idx));
                }

                let entries = tracker.list_all().unwrap();
                let keys: HashSet<(PathBuf, RetentionClass)> =
                    entries.iter().map(|e| (e.path.clone(), e.class)).collect();
                prop_assert_eq!(keys.len(), entries.len());
                prop_assert_eq!(entries.len(), model.len());
            }
        }
    }
}
