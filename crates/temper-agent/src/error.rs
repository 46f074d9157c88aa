//! Error types for agent operations

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while tracking and expiring paths
#[derive(Error, Debug)]
pub enum AgentError {
    /// Storage layer error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Filesystem access failed (permissions, in-use handles, transient I/O)
    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        /// Path being accessed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Change-notification subscription could not be established or was lost
    #[error("Subscription error for {}: {source}", root.display())]
    Subscription {
        /// Root the subscription was for
        root: PathBuf,
        /// Underlying watcher error
        #[source]
        source: notify::Error,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Task error (panicked or aborted tokio task)
    #[error("Task error: {0}")]
    Task(String),
}

impl AgentError {
    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn subscription(root: impl Into<PathBuf>, source: notify::Error) -> Self {
        Self::Subscription {
            root: root.into(),
            source,
        }
    }
}

impl From<tokio::task::JoinError> for AgentError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}
