//! SQLite storage backend for lnindex.
//!
//! Persists entity documents and checkpoints to a single SQLite file.
//! Uses `sqlx` with WAL mode for concurrent read performance.
//!
//! # Usage
//! ```rust,no_run
//! use lnindex_storage::sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStorage::open("./lnindex.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStorage::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use lnindex_core::checkpoint::{Checkpoint, CheckpointStore};
use lnindex_core::entity::Collection;
use lnindex_core::error::IndexerError;
use lnindex_core::store::{EntityStore, WriteBatch};

fn storage_err(e: sqlx::Error) -> IndexerError {
    IndexerError::Storage(e.to_string())
}

/// SQLite-backed storage for entities and checkpoints.
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./lnindex.db"`) or a full
    /// SQLite URL (`"sqlite:./lnindex.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, IndexerError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url).await.map_err(storage_err)?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Every pooled connection would get its own empty database, so the pool
    /// is capped at one connection. All data is lost when the pool is dropped.
    pub async fn in_memory() -> Result<Self, IndexerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_err)?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Create tables and enable WAL mode.
    async fn init_schema(&self) -> Result<(), IndexerError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        // Entity documents, one table for all collections
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS entities (
                collection TEXT NOT NULL,
                id         TEXT NOT NULL,
                data       TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                chain_id     TEXT    NOT NULL,
                indexer_id   TEXT    NOT NULL,
                block_number INTEGER NOT NULL,
                log_index    INTEGER NOT NULL,
                updated_at   INTEGER NOT NULL,
                PRIMARY KEY (chain_id, indexer_id)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }
}

// ─── EntityStore impl ────────────────────────────────────────────────────────

#[async_trait]
impl EntityStore for SqliteStorage {
    async fn load(&self, collection: Collection, id: &str) -> Result<Option<Value>, IndexerError> {
        let row = sqlx::query("SELECT data FROM entities WHERE collection = ? AND id = ?")
            .bind(collection.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        match row {
            Some(r) => {
                let data: String = r.get("data");
                Ok(Some(serde_json::from_str(&data)?))
            }
            None => Ok(None),
        }
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), IndexerError> {
        let writes = batch.len();
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        for op in batch.into_ops() {
            let data = serde_json::to_string(&op.data)?;
            sqlx::query("INSERT OR REPLACE INTO entities (collection, id, data) VALUES (?, ?, ?)")
                .bind(op.collection.as_str())
                .bind(&op.id)
                .bind(&data)
                .execute(&mut *tx)
                .await
                .map_err(storage_err)?;
        }

        tx.commit().await.map_err(storage_err)?;
        debug!(writes, "batch committed");
        Ok(())
    }

    async fn count(&self, collection: Collection) -> Result<u64, IndexerError> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM entities WHERE collection = ?")
            .bind(collection.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;

        let cnt: i64 = row.get("cnt");
        Ok(cnt as u64)
    }

    async fn ids(&self, collection: Collection) -> Result<Vec<String>, IndexerError> {
        let rows = sqlx::query("SELECT id FROM entities WHERE collection = ? ORDER BY id")
            .bind(collection.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(rows.iter().map(|r| r.get::<String, _>("id")).collect())
    }
}

// ─── CheckpointStore impl ────────────────────────────────────────────────────

#[async_trait]
impl CheckpointStore for SqliteStorage {
    async fn load(
        &self,
        chain_id: &str,
        indexer_id: &str,
    ) -> Result<Option<Checkpoint>, IndexerError> {
        let row = sqlx::query(
            "SELECT chain_id, indexer_id, block_number, log_index, updated_at
             FROM checkpoints WHERE chain_id = ? AND indexer_id = ?",
        )
        .bind(chain_id)
        .bind(indexer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(row.map(|r| Checkpoint {
            chain_id: r.get("chain_id"),
            indexer_id: r.get("indexer_id"),
            block_number: r.get::<i64, _>("block_number") as u64,
            log_index: r.get::<i64, _>("log_index") as u32,
            updated_at: r.get("updated_at"),
        }))
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), IndexerError> {
        sqlx::query(
            "INSERT OR REPLACE INTO checkpoints
             (chain_id, indexer_id, block_number, log_index, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&checkpoint.chain_id)
        .bind(&checkpoint.indexer_id)
        .bind(checkpoint.block_number as i64)
        .bind(checkpoint.log_index as i64)
        .bind(checkpoint.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        debug!(
            chain_id = %checkpoint.chain_id,
            indexer_id = %checkpoint.indexer_id,
            block = checkpoint.block_number,
            log_index = checkpoint.log_index,
            "checkpoint saved"
        );
        Ok(())
    }

    async fn delete(&self, chain_id: &str, indexer_id: &str) -> Result<(), IndexerError> {
        sqlx::query("DELETE FROM checkpoints WHERE chain_id = ? AND indexer_id = ?")
            .bind(chain_id)
            .bind(indexer_id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn checkpoint(indexer_id: &str, block_number: u64, log_index: u32) -> Checkpoint {
        Checkpoint {
            chain_id: "ethereum".into(),
            indexer_id: indexer_id.into(),
            block_number,
            log_index,
            updated_at: 1_700_000_000,
        }
    }

    // ── CheckpointStore ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn checkpoint_roundtrip() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.save(checkpoint("test-indexer", 1_000, 7)).await.unwrap();

        let loaded = CheckpointStore::load(&store, "ethereum", "test-indexer")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.block_number, 1_000);
        assert_eq!(loaded.log_index, 7);
        assert_eq!(loaded.updated_at, 1_700_000_000);
    }

    #[tokio::test]
    async fn checkpoint_upsert() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.save(checkpoint("my-indexer", 100, 0)).await.unwrap();
        store.save(checkpoint("my-indexer", 200, 4)).await.unwrap();

        // Only one row; second save overwrites the first
        let loaded = CheckpointStore::load(&store, "ethereum", "my-indexer")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.block_number, 200);
        assert_eq!(loaded.log_index, 4);
    }

    #[tokio::test]
    async fn checkpoint_delete() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.save(checkpoint("del-test", 500, 0)).await.unwrap();

        store.delete("ethereum", "del-test").await.unwrap();
        let loaded = CheckpointStore::load(&store, "ethereum", "del-test").await.unwrap();
        assert!(loaded.is_none());
    }

    // ── EntityStore ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn entity_commit_and_load() {
        let store = SqliteStorage::in_memory().await.unwrap();
        let mut batch = WriteBatch::new();
        batch.push(Collection::Nodes, "5", json!({ "owner": "0xa", "status": 0 }));
        batch.push(Collection::NodeEvents, "0x01-0", json!({ "type": "MINTED" }));
        store.commit(batch).await.unwrap();

        let node = EntityStore::load(&store, Collection::Nodes, "5").await.unwrap().unwrap();
        assert_eq!(node["owner"], "0xa");
        assert_eq!(store.count(Collection::NodeEvents).await.unwrap(), 1);
        assert!(EntityStore::load(&store, Collection::Htlcs, "5").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn later_op_in_batch_wins() {
        let store = SqliteStorage::in_memory().await.unwrap();
        let mut batch = WriteBatch::new();
        batch.push(Collection::NodeSales, "1", json!({ "sold": "0x0" }));
        batch.push(Collection::NodeSales, "1", json!({ "sold": "0x2" }));
        store.commit(batch).await.unwrap();

        let sale = EntityStore::load(&store, Collection::NodeSales, "1").await.unwrap().unwrap();
        assert_eq!(sale["sold"], "0x2");
        assert_eq!(store.count(Collection::NodeSales).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.upsert(Collection::Assets, "0xa1", json!({ "name": "BTC" })).await.unwrap();
        store.upsert(Collection::Tokens, "0xa1", json!({ "name": "USDT" })).await.unwrap();
        store.upsert(Collection::Tokens, "0x0b", json!({ "name": "DAI" })).await.unwrap();

        assert_eq!(store.ids(Collection::Tokens).await.unwrap(), vec!["0x0b", "0xa1"]);
        let asset = EntityStore::load(&store, Collection::Assets, "0xa1").await.unwrap().unwrap();
        assert_eq!(asset["name"], "BTC");
    }
}
