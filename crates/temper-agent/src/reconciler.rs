//! Root reconciler: catch-up scan run before a watcher goes live

use crate::{AgentError, PathTracker};
use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;
use temper_domain::{EntryStore, RetentionClass};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// Result of reconciling one root
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Entries that were not tracked before the scan
    pub added: usize,

    /// Files and directories seen under the root
    pub scanned: usize,

    /// Entries the walk could not read
    pub unreadable: usize,

    /// The scan stopped early on cancellation
    pub interrupted: bool,
}

/// Aligns the tracked entries of one root with what is on disk
///
/// Paths already tracked keep their discovery time; only untracked paths are
/// added. Running it twice over an unchanged tree adds nothing.
pub struct RootReconciler<S> {
    tracker: Arc<PathTracker<S>>,
}

impl<S> RootReconciler<S>
where
    S: EntryStore,
    S::Error: Display,
{
    /// Create a reconciler writing through the given tracker
    pub fn new(tracker: Arc<PathTracker<S>>) -> Self {
        Self { tracker }
    }

    /// Scan `root` recursively and track every untracked file and directory
    ///
    /// The root is created if missing, and is never tracked itself.
    /// Unreadable entries are logged and skipped; storage errors abort the scan.
    pub fn reconcile(&self, root: &Path, class: RetentionClass) -> Result<ReconcileReport, AgentError> {
        self.reconcile_until(root, class, &CancellationToken::new())
    }

    /// Like [`reconcile`](Self::reconcile), stopping between entries once `token` is cancelled
    pub fn reconcile_until(
        &self,
        root: &Path,
        class: RetentionClass,
        token: &CancellationToken,
    ) -> Result<ReconcileReport, AgentError> {
        ensure_root(root)?;

        let mut report = ReconcileReport::default();
        for item in WalkDir::new(root).min_depth(1).follow_links(false) {
            if token.is_cancelled() {
                report.interrupted = true;
                tracing::info!("[{}] Scan of {} cancelled after {} entries", class, root.display(), report.scanned);
                return Ok(report);
            }

            let entry = match item {
                Ok(entry) => entry,
                Err(e) => {
                    report.unreadable += 1;
                    let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                    tracing::warn!("[{}] Cannot scan {}: {}", class, path, e);
                    continue;
                }
            };

            report.scanned += 1;
            if self.tracker.insert_if_absent(entry.path(), class)? {
                report.added += 1;
                tracing::debug!("[{}] Tracked untracked entry: {}", class, entry.path().display());
            }
        }

        tracing::info!(
            "[{}] Directory {} was scanned: {} new entries, total: {}",
            class,
            root.display(),
            report.added,
            report.scanned
        );
        Ok(report)
    }
}

/// Create `root` (and its parents) if it does not exist yet
pub(crate) fn ensure_root(root: &Path) -> Result<(), AgentError> {
    if !root.is_dir() {
        std::fs::create_dir_all(root).map_err(|e| AgentError::filesystem(root, e))?;
        tracing::info!("Created directory {}", root.display());
    }
    Ok(())
}
