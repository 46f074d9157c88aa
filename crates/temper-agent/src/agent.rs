//! Agent: runs one watcher per retention class plus the expiry sweeper

use crate::reconciler::ensure_root;
use crate::{AgentConfig, AgentError, ChangeWatcher, ExpirySweeper, PathTracker};
use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;
use temper_domain::EntryStore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Composition root of the retention agent
///
/// All watchers and the sweeper share one [`PathTracker`], and through it one
/// store handle.
///
/// # Examples
///
/// ```no_run
/// use temper_agent::{Agent, AgentConfig};
/// use temper_store::SqliteStore;
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = SqliteStore::new("temp/temper.sqlite")?;
///     let agent = Agent::new(AgentConfig::default(), store)?;
///
///     // Runs until the token is cancelled or a task fails
///     agent.run("temp".as_ref(), CancellationToken::new()).await?;
///     Ok(())
/// }
/// ```
pub struct Agent<S> {
    config: AgentConfig,
    tracker: Arc<PathTracker<S>>,
    sweeper: ExpirySweeper<S>,
}

impl<S> Agent<S>
where
    S: EntryStore + Send + 'static,
    S::Error: Display,
{
    /// Create an agent over `store`
    pub fn new(config: AgentConfig, store: S) -> Result<Self, AgentError> {
        config.validate()?;
        let tracker = Arc::new(PathTracker::new(store));
        let sweeper = ExpirySweeper::new(Arc::clone(&tracker), &config);
        Ok(Self {
            config,
            tracker,
            sweeper,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Shared path tracker
    pub fn tracker(&self) -> &Arc<PathTracker<S>> {
        &self.tracker
    }

    /// The expiry sweeper (shares metrics with the running one)
    pub fn sweeper(&self) -> &ExpirySweeper<S> {
        &self.sweeper
    }

    /// One watcher per configured class, rooted at `root/<class>`
    pub fn watchers(&self, root: &Path) -> Vec<ChangeWatcher<S>> {
        self.config
            .classes
            .iter()
            .map(|&class| ChangeWatcher::new(root.join(class.dir_name()), class, Arc::clone(&self.tracker)))
            .collect()
    }

    /// Watch every class root under `root` and sweep until `token` is cancelled
    ///
    /// Completes once every task has completed. The first task to fail cancels
    /// the others and its error is returned; crashed tasks are not restarted.
    pub async fn run(&self, root: &Path, token: CancellationToken) -> Result<(), AgentError> {
        ensure_root(root)?;
        tracing::info!(
            "Starting temper at {} (classes: {})",
            root.display(),
            self.config.classes.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ")
        );

        let tasks_token = token.child_token();
        let mut tasks = JoinSet::new();

        for watcher in self.watchers(root) {
            tasks.spawn(watcher.run(tasks_token.clone()));
        }

        let sweeper = self.sweeper.clone();
        let sweeper_token = tasks_token.clone();
        tasks.spawn(async move { sweeper.run(sweeper_token).await });

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let failure = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(e) => AgentError::from(e),
            };

            if first_error.is_none() {
                tracing::error!("Agent task failed, shutting down: {}", failure);
                tasks_token.cancel();
                first_error = Some(failure);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                tracing::info!("Temper stopped");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::tests::MockStore;
    use temper_domain::RetentionClass;

    #[test]
    fn test_invalid_config_rejected() {
        let config = AgentConfig {
            classes: Vec::new(),
            ..Default::default()
        };
        assert!(Agent::new(config, MockStore::default()).is_err());
    }

    #[test]
    fn test_watchers_follow_configured_classes() {
        let config = AgentConfig {
            classes: vec![RetentionClass::Monthly, RetentionClass::Daily],
            ..Default::default()
        };
        let agent = Agent::new(config, MockStore::default()).unwrap();
        let watchers = agent.watchers(Path::new("/srv/temp"));

        assert_eq!(watchers.len(), 2);
        assert_eq!(watchers[0].root(), Path::new("/srv/temp/monthly"));
        assert_eq!(watchers[0].class(), RetentionClass::Monthly);
        assert_eq!(watchers[1].root(), Path::new("/srv/temp/daily"));
    }

    #[tokio::test]
    async fn test_storage_failure_fails_run() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("daily")).unwrap();
        std::fs::write(dir.path().join("daily/a.txt"), b"a").unwrap();

        let agent = Agent::new(AgentConfig::default(), MockStore::failing()).unwrap();
        let token = CancellationToken::new();
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            agent.run(dir.path(), token.clone()),
        )
        .await
        .expect("run should fail fast instead of hanging");

        assert!(matches!(result, Err(AgentError::Storage(_))));
        // The caller's token is left alone
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn test_run_creates_class_directories_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("temp");
        let agent = Agent::new(AgentConfig::default(), MockStore::default()).unwrap();

        let token = CancellationToken::new();
        token.cancel();
        agent.run(&root, token).await.unwrap();

        for class in RetentionClass::ALL {
            assert!(root.join(class.dir_name()).is_dir());
        }
    }
}
