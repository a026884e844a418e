//! lnindex-core: event model and reconcilers for the lnindex indexer.
//!
//! # Architecture
//!
//! ```text
//! DecodedEvent stream → Processor
//!                         ├── CheckpointManager (resume position)
//!                         └── Reconciler
//!                               ├── htlc  (assets, tokens, pairs, HTLC lifecycle)
//!                               ├── node  (node NFT lifecycle, mining rewards)
//!                               └── sale  (node sales, purchases, bindings)
//!                                     │
//!                                     ▼
//!                               EntityStore (one WriteBatch per event)
//! ```

pub mod checkpoint;
pub mod config;
pub mod contract;
pub mod entity;
pub mod error;
pub mod event;
pub mod processor;
pub mod reconcile;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use checkpoint::{Checkpoint, CheckpointManager, CheckpointStore, MemoryCheckpointStore};
pub use config::{ContractAddresses, IndexerBuilder, IndexerConfig, LogConfig};
pub use contract::{ContractStateReader, HtlcContractState, MemoryContractState};
pub use entity::{Collection, Entity};
pub use error::{IndexerError, SkipReason};
pub use event::{ChainEvent, ContractFamily};
pub use processor::{ProcessStats, Processor};
pub use reconcile::{Outcome, Reconciler};
pub use store::{load_entity, EntityStore, WriteBatch};
pub use types::{DecodedEvent, EventEnvelope, LogPosition};
