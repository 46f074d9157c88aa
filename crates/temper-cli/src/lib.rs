//! Temper CLI library.
//!
//! Argument parsing, logging setup and process wiring for the `temper` binary.

pub mod cli;

pub use cli::Cli;

use anyhow::{Context, Result};
use std::path::Path;
use temper_agent::{Agent, AgentConfig};
use temper_store::SqliteStore;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Install the log subscriber (stderr, `RUST_LOG` aware, `info` by default).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

/// Build an agent for `root`: load its configuration and open its database.
pub fn open_agent(root: &Path) -> Result<Agent<SqliteStore>> {
    std::fs::create_dir_all(root)
        .with_context(|| format!("Failed to create root directory {}", root.display()))?;

    let config = AgentConfig::load_for_root(root).context("Failed to load configuration")?;

    let db_path = config.database_path_for(root);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory {}", parent.display()))?;
    }
    let store = SqliteStore::new(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    tracing::info!("Using database {}", db_path.display());

    Ok(Agent::new(config, store)?)
}

/// Run the agent on `root` until `token` is cancelled or a task fails.
pub async fn run_agent(root: &Path, token: CancellationToken) -> Result<()> {
    let agent = open_agent(root)?;
    agent.run(root, token).await.context("Agent stopped with an error")?;
    Ok(())
}
