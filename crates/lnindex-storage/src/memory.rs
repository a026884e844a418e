//! In-memory storage backend.
//!
//! Stores entities and checkpoints in RAM. Useful for tests, dry-run
//! replays, and short-lived indexers that don't need persistence.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use lnindex_core::checkpoint::{Checkpoint, CheckpointStore};
use lnindex_core::entity::Collection;
use lnindex_core::error::IndexerError;
use lnindex_core::store::{EntityStore, WriteBatch};

/// In-memory indexer storage.
///
/// All data is lost when the process exits. A batch is applied while holding
/// the entity lock, so readers never observe part of one.
#[derive(Default)]
pub struct InMemoryStorage {
    entities: Mutex<HashMap<Collection, BTreeMap<String, Value>>>,
    checkpoints: Mutex<HashMap<String, Checkpoint>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityStore for InMemoryStorage {
    async fn load(&self, collection: Collection, id: &str) -> Result<Option<Value>, IndexerError> {
        let entities = self.entities.lock().unwrap();
        Ok(entities.get(&collection).and_then(|c| c.get(id)).cloned())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), IndexerError> {
        let mut entities = self.entities.lock().unwrap();
        for op in batch.into_ops() {
            entities.entry(op.collection).or_default().insert(op.id, op.data);
        }
        Ok(())
    }

    async fn count(&self, collection: Collection) -> Result<u64, IndexerError> {
        let entities = self.entities.lock().unwrap();
        Ok(entities.get(&collection).map_or(0, |c| c.len() as u64))
    }

    async fn ids(&self, collection: Collection) -> Result<Vec<String>, IndexerError> {
        let entities = self.entities.lock().unwrap();
        Ok(entities
            .get(&collection)
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl CheckpointStore for InMemoryStorage {
    async fn load(
        &self,
        chain_id: &str,
        indexer_id: &str,
    ) -> Result<Option<Checkpoint>, IndexerError> {
        let key = format!("{chain_id}:{indexer_id}");
        Ok(self.checkpoints.lock().unwrap().get(&key).cloned())
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), IndexerError> {
        let key = format!("{}:{}", checkpoint.chain_id, checkpoint.indexer_id);
        self.checkpoints.lock().unwrap().insert(key, checkpoint);
        Ok(())
    }

    async fn delete(&self, chain_id: &str, indexer_id: &str) -> Result<(), IndexerError> {
        let key = format!("{chain_id}:{indexer_id}");
        self.checkpoints.lock().unwrap().remove(&key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn batch_applies_in_order() {
        let store = InMemoryStorage::new();
        let mut batch = WriteBatch::new();
        batch.push(Collection::Nodes, "5", json!({ "owner": "0xa" }));
        batch.push(Collection::NodeEvents, "0x01-0", json!({ "type": "MINTED" }));
        batch.push(Collection::Nodes, "5", json!({ "owner": "0xb" }));
        store.commit(batch).await.unwrap();

        let node = EntityStore::load(&store, Collection::Nodes, "5").await.unwrap().unwrap();
        assert_eq!(node["owner"], "0xb");
        assert_eq!(store.count(Collection::Nodes).await.unwrap(), 1);
        assert_eq!(store.count(Collection::NodeEvents).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn ids_are_sorted_per_collection() {
        let store = InMemoryStorage::new();
        store.upsert(Collection::NodeSales, "2", json!({})).await.unwrap();
        store.upsert(Collection::NodeSales, "10", json!({})).await.unwrap();
        store.upsert(Collection::Purchases, "0x1-0", json!({})).await.unwrap();

        assert_eq!(store.ids(Collection::NodeSales).await.unwrap(), vec!["10", "2"]);
        assert_eq!(store.count(Collection::Purchases).await.unwrap(), 1);
        assert_eq!(store.count(Collection::Htlcs).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn checkpoint_roundtrip() {
        let store = InMemoryStorage::new();
        let cp = Checkpoint {
            chain_id: "ethereum".into(),
            indexer_id: "test".into(),
            block_number: 1000,
            log_index: 3,
            updated_at: 0,
        };
        store.save(cp).await.unwrap();
        let loaded = CheckpointStore::load(&store, "ethereum", "test").await.unwrap().unwrap();
        assert_eq!(loaded.block_number, 1000);
        assert_eq!(loaded.log_index, 3);

        store.delete("ethereum", "test").await.unwrap();
        assert!(CheckpointStore::load(&store, "ethereum", "test").await.unwrap().is_none());
    }
}
