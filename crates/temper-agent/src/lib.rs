//! Temper Agent
//!
//! Self-cleaning temporary storage: everything dropped under a retention root
//! is tracked and deleted once it outlives its retention class.
//!
//! # Overview
//!
//! The agent is responsible for:
//! - **Tracking**: recording when each file and directory appeared
//! - **Reconciliation**: catching up on changes made while it was not running
//! - **Live watching**: following create, rename, modify and delete notifications
//! - **Expiry**: deleting entries past their class's maximum age
//! - **Self-healing**: dropping records whose target vanished unnoticed
//!
//! # Architecture
//!
//! ```text
//!   ChangeWatcher (daily) ──┐
//!   ChangeWatcher (weekly) ─┼──> PathTracker ──> EntryStore (SQLite)
//!   ChangeWatcher (monthly) ┤
//!   ExpirySweeper ──────────┘
//! ```
//!
//! Every component talks to storage only through the [`PathTracker`], which
//! serializes access.
//!
//! ## Retention classes
//!
//! | Class | Directory | Default maximum age |
//! |-------|-----------|---------------------|
//! | **Daily** | `daily/` | 24 hours |
//! | **Weekly** | `weekly/` | 168 hours |
//! | **Monthly** | `monthly/` | 720 hours |
//!
//! # Usage
//!
//! ## One-time Sweep
//!
//! ```no_run
//! use std::sync::Arc;
//! use temper_agent::{AgentConfig, ExpirySweeper, PathTracker};
//! use temper_store::SqliteStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let tracker = Arc::new(PathTracker::new(SqliteStore::new("temper.sqlite")?));
//! let sweeper = ExpirySweeper::new(tracker, &AgentConfig::default());
//!
//! let report = sweeper.sweep()?;
//! println!("{} deleted, {} vanished", report.deleted, report.vanished);
//! # Ok(())
//! # }
//! ```
//!
//! ## Full Agent
//!
//! ```no_run
//! use temper_agent::{Agent, AgentConfig};
//! use temper_store::SqliteStore;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = SqliteStore::new("temp/temper.sqlite")?;
//!     let agent = Agent::new(AgentConfig::default(), store)?;
//!     agent.run("temp".as_ref(), CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

mod agent;
mod config;
mod error;
mod metrics;
mod policy;
mod reconciler;
mod sweeper;
mod tracker;
mod watcher;

pub use agent::Agent;
pub use config::{AgentConfig, CONFIG_FILE_NAME, DEFAULT_DATABASE_NAME};
pub use error::AgentError;
pub use metrics::{SweepMetrics, SweepReport};
pub use policy::RetentionPolicy;
pub use reconciler::{ReconcileReport, RootReconciler};
pub use sweeper::{reclaim, ExpirySweeper, Reclaimed};
pub use tracker::{PathTracker, Upsert};
pub use watcher::{translate, ChangeEvent, ChangeKind, ChangeWatcher, Subscription, WatcherState};
