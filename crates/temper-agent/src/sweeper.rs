//! Expiry sweeper: periodic enforcement of the retention policy

use crate::{AgentConfig, AgentError, PathTracker, RetentionPolicy, SweepMetrics, SweepReport};
use chrono::{DateTime, Utc};
use std::fmt::Display;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use temper_domain::{EntryStore, TrackedEntry};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// What happened on disk when an expired entry was reclaimed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reclaimed {
    /// The file or directory tree was removed
    Deleted,
    /// Nothing was there anymore
    Missing,
}

/// Remove a file, or a directory with all of its contents
///
/// A target that is already gone, before or during removal, is `Missing`
/// rather than an error. Symlinks are removed, never followed.
pub fn reclaim(path: &Path) -> io::Result<Reclaimed> {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Reclaimed::Missing),
        Err(e) => return Err(e),
    };

    let removed = if meta.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };

    match removed {
        Ok(()) => Ok(Reclaimed::Deleted),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Reclaimed::Missing),
        Err(e) => Err(e),
    }
}

fn is_missing(path: &Path) -> bool {
    matches!(std::fs::symlink_metadata(path), Err(e) if e.kind() == io::ErrorKind::NotFound)
}

/// Deletes tracked entries that outlived their retention class
///
/// Each tick lists every tracked entry, deletes expired targets from disk and
/// drops their records. Records whose target has disappeared are dropped too.
/// A failed deletion keeps the record so the next tick retries it.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use temper_agent::{AgentConfig, ExpirySweeper, PathTracker};
/// use temper_store::SqliteStore;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let tracker = Arc::new(PathTracker::new(SqliteStore::new("temper.sqlite")?));
/// let sweeper = ExpirySweeper::new(tracker, &AgentConfig::default());
///
/// // Perform a single sweep
/// let report = sweeper.sweep()?;
/// println!("{} entries checked", report.examined);
/// # Ok(())
/// # }
/// ```
pub struct ExpirySweeper<S> {
    tracker: Arc<PathTracker<S>>,
    policy: RetentionPolicy,
    interval: Duration,
    dry_run: bool,
    metrics: Arc<Mutex<SweepMetrics>>,
}

impl<S> Clone for ExpirySweeper<S> {
    fn clone(&self) -> Self {
        Self {
            tracker: Arc::clone(&self.tracker),
            policy: self.policy,
            interval: self.interval,
            dry_run: self.dry_run,
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<S> ExpirySweeper<S>
where
    S: EntryStore + Send + 'static,
    S::Error: Display,
{
    /// Create a sweeper using the retention table and interval of `config`
    pub fn new(tracker: Arc<PathTracker<S>>, config: &AgentConfig) -> Self {
        Self {
            tracker,
            policy: config.retention,
            interval: config.sweep_interval(),
            dry_run: config.dry_run,
            metrics: Arc::new(Mutex::new(SweepMetrics::new())),
        }
    }

    fn metrics_guard(&self) -> MutexGuard<'_, SweepMetrics> {
        self.metrics.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get a snapshot of the cumulative metrics
    pub fn metrics(&self) -> SweepMetrics {
        self.metrics_guard().clone()
    }

    /// Reset the metrics counters
    pub fn reset_metrics(&self) {
        self.metrics_guard().reset();
    }

    /// Whether an entry is older than its class allows at `now`
    pub fn is_expired(&self, entry: &TrackedEntry, now: DateTime<Utc>) -> bool {
        let max_age = self.policy.max_age(entry.class);
        now.signed_duration_since(entry.discovered_at)
            .to_std()
            .is_ok_and(|age| age > max_age)
    }

    /// Run one sweep tick against the current time
    pub fn sweep(&self) -> Result<SweepReport, AgentError> {
        self.sweep_at(Utc::now())
    }

    /// Run one sweep tick as if the current time were `now`
    ///
    /// Per-entry filesystem failures are logged and counted; storage errors
    /// abort the tick.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport, AgentError> {
        let start = Instant::now();
        let entries = self.tracker.list_all()?;
        let mut report = SweepReport::default();

        for entry in &entries {
            report.examined += 1;

            if !self.is_expired(entry, now) {
                if is_missing(&entry.path) && self.drop_record(entry)? {
                    tracing::info!("[{}] Entry no longer exists: {}", entry.class, entry.path.display());
                    self.metrics_guard().record_vanished(entry.class);
                    report.vanished += 1;
                }
                continue;
            }

            if self.dry_run {
                tracing::info!("[{}] DRY RUN: Would delete {}", entry.class, entry.path.display());
                report.skipped += 1;
                continue;
            }

            match reclaim(&entry.path) {
                Ok(Reclaimed::Deleted) => {
                    tracing::info!("[{}] Expired entry was deleted: {}", entry.class, entry.path.display());
                    self.drop_record(entry)?;
                    self.metrics_guard().record_deletion(entry.class);
                    report.deleted += 1;
                }
                Ok(Reclaimed::Missing) => {
                    if self.drop_record(entry)? {
                        tracing::info!(
                            "[{}] File or directory does not exist: {}",
                            entry.class,
                            entry.path.display()
                        );
                        self.metrics_guard().record_vanished(entry.class);
                        report.vanished += 1;
                    }
                }
                Err(e) => {
                    let err = AgentError::filesystem(&entry.path, e);
                    tracing::warn!("[{}] Cannot delete, will retry next sweep: {}", entry.class, err);
                    self.metrics_guard().record_failure();
                    report.failed += 1;
                }
            }
        }

        let runtime_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.metrics_guard().record_sweep(&report, runtime_ms);
        Ok(report)
    }

    // Records touched by a watcher since the snapshot are newer than this tick
    fn drop_record(&self, entry: &TrackedEntry) -> Result<bool, AgentError> {
        let removed = self.tracker.remove_if_unchanged(entry)?;
        if !removed {
            tracing::debug!(
                "[{}] Entry changed during sweep, keeping it: {}",
                entry.class,
                entry.path.display()
            );
        }
        Ok(removed)
    }

    async fn tick(&self) -> Result<SweepReport, AgentError> {
        tracing::debug!("Starting sweep cycle at {}", Utc::now());
        let sweeper = self.clone();
        let report = tokio::task::spawn_blocking(move || sweeper.sweep()).await??;
        Ok(report)
    }

    /// Run sweeps on the configured interval until `token` is cancelled
    ///
    /// The first sweep runs immediately. A sweep in progress is allowed to
    /// finish before the sweeper stops.
    ///
    /// # Errors
    ///
    /// Returns the first storage error; filesystem failures never stop the loop.
    pub async fn run(&self, token: CancellationToken) -> Result<(), AgentError> {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!("Expiry sweeper started (interval: {:?})", self.interval);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.tick().await {
                Ok(report) => {
                    let next = chrono::Duration::from_std(self.interval)
                        .ok()
                        .and_then(|step| Utc::now().checked_add_signed(step))
                        .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    tracing::info!(
                        "{} entries were checked: {} deleted, {} vanished, {} failed. Next sweep at {}",
                        report.examined,
                        report.deleted,
                        report.vanished,
                        report.failed,
                        next
                    );
                }
                Err(e) => {
                    tracing::error!("Sweep failed: {}", e);
                    return Err(e);
                }
            }
        }

        tracing::info!("Expiry sweeper stopped. Final metrics:\n{}", self.metrics().summary());
        Ok(())
    }

    /// Run for a specific number of cycles (useful for testing)
    pub async fn run_cycles(&self, cycles: usize) -> Result<(), AgentError> {
        let mut ticker = interval(self.interval);

        for cycle in 0..cycles {
            ticker.tick().await;
            let report = self.tick().await?;
            tracing::info!("Sweep {}/{} completed: {} entries checked", cycle + 1, cycles, report.examined);
        }

        Ok(())
    }
}
