//! Temper Domain Layer
//!
//! This crate contains the core vocabulary of the Temper retention agent.
//! It depends only on `chrono` and defines the value objects and the storage
//! trait that all other layers build upon.
//!
//! ## Key Concepts
//!
//! - **Retention class**: a named category (daily, weekly, monthly) that decides
//!   how long a tracked path is kept before it is deleted
//! - **Tracked entry**: a persisted record associating a path and retention class
//!   with the time it was discovered
//! - **Entry store**: the persistence boundary; infrastructure crates implement it
//!
//! ## Architecture
//!
//! - No infrastructure code
//! - Pure data types and trait definitions
//! - Storage and filesystem concerns live in other crates

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod entry;
pub mod retention;
pub mod traits;

// Re-exports for convenience
pub use entry::{EntryId, NewEntry, TrackedEntry};
pub use retention::RetentionClass;
pub use traits::{EntryQuery, EntryStore};
