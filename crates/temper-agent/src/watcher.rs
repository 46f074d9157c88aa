//! Change watcher: keeps one retention root's entries in step with the filesystem

use crate::reconciler::{ensure_root, RootReconciler};
use crate::{AgentError, PathTracker};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use temper_domain::{EntryStore, RetentionClass};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Kind of change reported for a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Path was created
    Created,
    /// Path appeared under a new name
    Renamed,
    /// Path content or metadata changed
    Modified,
    /// Path was removed (or renamed away)
    Deleted,
}

/// A change to one absolute path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// What happened
    pub kind: ChangeKind,
    /// Affected path
    pub path: PathBuf,
}

impl ChangeEvent {
    fn new(kind: ChangeKind, path: PathBuf) -> Self {
        Self { kind, path }
    }
}

/// Translate a raw notification into per-path changes
///
/// A rename carrying both names becomes a delete of the old name followed by a
/// rename to the new one. Access notifications are dropped.
pub fn translate(event: &Event) -> Vec<ChangeEvent> {
    let all = |kind: ChangeKind| -> Vec<ChangeEvent> {
        event
            .paths
            .iter()
            .map(|p| ChangeEvent::new(kind, p.clone()))
            .collect()
    };

    match &event.kind {
        EventKind::Create(_) => all(ChangeKind::Created),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::Both if event.paths.len() == 2 => vec![
                ChangeEvent::new(ChangeKind::Deleted, event.paths[0].clone()),
                ChangeEvent::new(ChangeKind::Renamed, event.paths[1].clone()),
            ],
            RenameMode::From => all(ChangeKind::Deleted),
            RenameMode::To => all(ChangeKind::Renamed),
            // Backends that cannot tell the two names apart
            _ => event
                .paths
                .iter()
                .map(|p| {
                    let kind = if p.exists() { ChangeKind::Renamed } else { ChangeKind::Deleted };
                    ChangeEvent::new(kind, p.clone())
                })
                .collect(),
        },
        EventKind::Modify(_) => all(ChangeKind::Modified),
        EventKind::Remove(_) => all(ChangeKind::Deleted),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

/// Live change-notification subscription for one root (recursive)
///
/// Notifications are buffered from the moment of subscribing. Dropping the
/// subscription releases the OS watch.
pub struct Subscription {
    root: PathBuf,
    watcher: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
}

impl Subscription {
    /// Start receiving notifications for `root` and everything below it
    pub fn subscribe(root: &Path) -> Result<Self, AgentError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })
        .map_err(|e| AgentError::subscription(root, e))?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| AgentError::subscription(root, e))?;

        Ok(Self {
            root: root.to_path_buf(),
            watcher,
            rx,
        })
    }

    /// Wait for the next non-empty batch of changes
    ///
    /// Backend errors inside the stream are logged and skipped; a closed
    /// stream is a subscription error.
    pub async fn next_changes(&mut self) -> Result<Vec<ChangeEvent>, AgentError> {
        loop {
            match self.rx.recv().await {
                Some(Ok(event)) => {
                    tracing::debug!("Watch event on {}: {:?}", self.root.display(), event);
                    let changes = translate(&event);
                    if !changes.is_empty() {
                        return Ok(changes);
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!("Watch error on {}: {}", self.root.display(), e);
                }
                None => {
                    return Err(AgentError::subscription(
                        &self.root,
                        notify::Error::generic("notification stream closed"),
                    ));
                }
            }
        }
    }

    /// Stop delivery and release the OS watch
    pub fn unsubscribe(mut self) {
        if let Err(e) = self.watcher.unwatch(&self.root) {
            tracing::debug!("Unwatch of {} failed: {}", self.root.display(), e);
        }
    }
}

/// Lifecycle of a change watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// Making sure the root exists
    Starting,
    /// Running the catch-up scan
    Reconciling,
    /// Applying live notifications
    Watching,
    /// Cancelled or failed; subscription released
    Stopped,
}

/// Watches one retention root and forwards its changes to the tracker
///
/// Create, rename and modify notifications upsert the path; delete
/// notifications remove it. The watcher never deletes anything on disk.
/// Store work runs on the blocking pool. If the root itself disappears the
/// watcher stops with [`AgentError::Subscription`].
pub struct ChangeWatcher<S> {
    root: PathBuf,
    class: RetentionClass,
    tracker: Arc<PathTracker<S>>,
    state: watch::Sender<WatcherState>,
}

impl<S> ChangeWatcher<S>
where
    S: EntryStore + Send + 'static,
    S::Error: Display,
{
    /// Create a watcher for `root`, tracking entries under `class`
    pub fn new(root: impl Into<PathBuf>, class: RetentionClass, tracker: Arc<PathTracker<S>>) -> Self {
        let (state, _) = watch::channel(WatcherState::Starting);
        Self {
            root: root.into(),
            class,
            tracker,
            state,
        }
    }

    /// Root directory being watched
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Retention class of the root
    pub fn class(&self) -> RetentionClass {
        self.class
    }

    /// Observe state transitions
    pub fn state(&self) -> watch::Receiver<WatcherState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: WatcherState) {
        self.state.send_replace(state);
        tracing::debug!("[{}] Watcher {} -> {:?}", self.class, self.root.display(), state);
    }

    /// Reconcile the root, then apply live changes until `token` is cancelled
    ///
    /// The subscription is opened before the catch-up scan so that nothing
    /// changed during the scan is lost; buffered changes are applied once the
    /// scan has finished. Cancellation also interrupts the scan.
    pub async fn run(self, token: CancellationToken) -> Result<(), AgentError> {
        let result = self.run_inner(&token).await;
        if let Err(e) = &result {
            tracing::error!("[{}] Watcher for {} failed: {}", self.class, self.root.display(), e);
        }
        self.set_state(WatcherState::Stopped);
        result
    }

    async fn run_inner(&self, token: &CancellationToken) -> Result<(), AgentError> {
        self.set_state(WatcherState::Starting);
        ensure_root(&self.root)?;
        let root = std::fs::canonicalize(&self.root).map_err(|e| AgentError::filesystem(&self.root, e))?;

        self.set_state(WatcherState::Reconciling);
        let mut subscription = Subscription::subscribe(&root)?;
        let reconciler = RootReconciler::new(Arc::clone(&self.tracker));
        let (scan_root, class, scan_token) = (root.clone(), self.class, token.clone());
        tokio::task::spawn_blocking(move || reconciler.reconcile_until(&scan_root, class, &scan_token)).await??;

        if token.is_cancelled() {
            subscription.unsubscribe();
            return Ok(());
        }

        self.set_state(WatcherState::Watching);
        tracing::info!("[{}] Watching {}", self.class, root.display());

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                changes = subscription.next_changes() => {
                    let changes = changes?;
                    let (tracker, root, class) = (Arc::clone(&self.tracker), root.clone(), self.class);
                    tokio::task::spawn_blocking(move || {
                        changes
                            .iter()
                            .try_for_each(|change| apply_change(tracker.as_ref(), &root, class, change))
                    })
                    .await??;
                }
            }
        }

        subscription.unsubscribe();
        tracing::info!("[{}] Stopped watching {}", self.class, root.display());
        Ok(())
    }

    #[cfg(test)]
    fn apply(&self, root: &Path, change: &ChangeEvent) -> Result<(), AgentError> {
        apply_change(self.tracker.as_ref(), root, self.class, change)
    }
}

/// Forward one change under `root` to the tracker
///
/// Losing the root itself ends the subscription: the OS drops the watch with it.
fn apply_change<S>(
    tracker: &PathTracker<S>,
    root: &Path,
    class: RetentionClass,
    change: &ChangeEvent,
) -> Result<(), AgentError>
where
    S: EntryStore,
    S::Error: Display,
{
    if change.path == root {
        if change.kind == ChangeKind::Deleted && !root.is_dir() {
            return Err(AgentError::subscription(
                root,
                notify::Error::path_not_found().add_path(root.to_path_buf()),
            ));
        }
        return Ok(());
    }
    if !change.path.starts_with(root) {
        return Ok(());
    }

    match change.kind {
        ChangeKind::Created | ChangeKind::Renamed | ChangeKind::Modified => {
            tracker.upsert(&change.path, class)?;
        }
        ChangeKind::Deleted => {
            tracker.remove(&change.path, class)?;
        }
    }
    Ok(())
}
