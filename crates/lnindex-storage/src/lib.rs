//! lnindex-storage: entity and checkpoint storage backends for lnindex.
//!
//! Backends:
//! - [`memory`]: in-memory (dev/testing, no persistence)
//! - [`sqlite`]: SQLite via `sqlx` (embedded, single-file persistence)
//!
//! Each backend implements both `EntityStore` and `CheckpointStore`, so one
//! handle serves the reconciler and the processor's checkpoints.

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::InMemoryStorage;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;
