//! Entity store interface and the per-event write batch.
//!
//! Reconcilers never write directly: every upsert an event produces is staged
//! in a [`WriteBatch`] and handed to [`EntityStore::commit`] once, so a store
//! either shows all of an event's writes or none of them.

use async_trait::async_trait;
use serde_json::Value;

use crate::entity::{Collection, Entity};
use crate::error::IndexerError;

/// A single staged upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOp {
    pub collection: Collection,
    pub id: String,
    pub data: Value,
}

/// Ordered upserts produced by one event. Later ops win on the same key.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an upsert of `entity` into its collection.
    pub fn put<T: Entity>(&mut self, entity: &T) -> Result<(), IndexerError> {
        let data = serde_json::to_value(entity)?;
        self.push(T::COLLECTION, entity.id(), data);
        Ok(())
    }

    /// Stage an upsert of an already-serialized document.
    pub fn push(&mut self, collection: Collection, id: impl Into<String>, data: Value) {
        self.ops.push(WriteOp {
            collection,
            id: id.into(),
            data,
        });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Keyed document store grouped into [`Collection`]s.
///
/// Implementations include `InMemoryStorage` and `SqliteStorage` in
/// `lnindex-storage`.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Load one document, `None` if absent.
    async fn load(&self, collection: Collection, id: &str) -> Result<Option<Value>, IndexerError>;

    /// Apply every op in `batch` atomically, in order.
    async fn commit(&self, batch: WriteBatch) -> Result<(), IndexerError>;

    /// Number of documents in a collection.
    async fn count(&self, collection: Collection) -> Result<u64, IndexerError>;

    /// All ids in a collection, sorted.
    async fn ids(&self, collection: Collection) -> Result<Vec<String>, IndexerError>;

    /// Upsert a single document.
    async fn upsert(&self, collection: Collection, id: &str, data: Value) -> Result<(), IndexerError> {
        let mut batch = WriteBatch::new();
        batch.push(collection, id, data);
        self.commit(batch).await
    }
}

/// Load and deserialize a typed entity.
pub async fn load_entity<T: Entity>(
    store: &dyn EntityStore,
    id: &str,
) -> Result<Option<T>, IndexerError> {
    match store.load(T::COLLECTION, id).await? {
        Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
        None => Ok(None),
    }
}
