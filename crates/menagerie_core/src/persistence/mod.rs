//! Per-instance persisted tags.
//!
//! # Responsibility
//! - Define the four-field tag layout stored for every injected instance.
//! - Provide in-memory and SQLite-backed stores behind one trait.
//! - Upgrade stored data to the current data version.
//!
//! # Invariants
//! - Tags are keyed by instance uuid; process-local ids are never persisted.
//! - Migration never fabricates a data version for unknown-origin data.

pub mod migration;
pub mod sqlite;
pub mod store;
pub mod tag;

pub use migration::{
    default_steps, migrate_to, MigrationOutcome, MigrationStep, CURRENT_DATA_VERSION,
};
pub use sqlite::SqliteTagStore;
pub use store::{MemoryTagStore, TagResult, TagStore, TagStoreError};
pub use tag::{TagField, TagValue};
