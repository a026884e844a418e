//! Test doubles shared by the unit tests of this crate.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use crate::entity::Collection;
use crate::error::IndexerError;
use crate::store::{EntityStore, WriteBatch};
use crate::types::DecodedEvent;

/// HashMap-backed store that can be told to reject commits.
#[derive(Default)]
pub struct TestStore {
    data: Mutex<HashMap<Collection, BTreeMap<String, Value>>>,
    fail_commits: AtomicBool,
}

impl TestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl EntityStore for TestStore {
    async fn load(&self, collection: Collection, id: &str) -> Result<Option<Value>, IndexerError> {
        let data = self.data.lock().unwrap();
        Ok(data.get(&collection).and_then(|c| c.get(id)).cloned())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), IndexerError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(IndexerError::Storage("commit rejected".into()));
        }
        let mut data = self.data.lock().unwrap();
        for op in batch.into_ops() {
            data.entry(op.collection).or_default().insert(op.id, op.data);
        }
        Ok(())
    }

    async fn count(&self, collection: Collection) -> Result<u64, IndexerError> {
        let data = self.data.lock().unwrap();
        Ok(data.get(&collection).map(|c| c.len() as u64).unwrap_or(0))
    }

    async fn ids(&self, collection: Collection) -> Result<Vec<String>, IndexerError> {
        let data = self.data.lock().unwrap();
        Ok(data
            .get(&collection)
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default())
    }
}

/// Records the level of every tracing event emitted on this thread.
#[derive(Clone, Default)]
pub struct LevelLog(Arc<Mutex<Vec<Level>>>);

impl LevelLog {
    /// Start capturing; capture stops when the guard is dropped.
    pub fn capture() -> (Self, DefaultGuard) {
        let log = Self::default();
        let subscriber = tracing_subscriber::registry().with(log.clone());
        (log, tracing::subscriber::set_default(subscriber))
    }

    pub fn levels(&self) -> Vec<Level> {
        self.0.lock().unwrap().clone()
    }
}

impl<S: Subscriber> Layer<S> for LevelLog {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.0.lock().unwrap().push(*event.metadata().level());
    }
}

/// Build a decoded event at `(block, log_index)` with the given fields.
pub fn event(schema: &str, block: u64, log_index: u32, fields: Value) -> DecodedEvent {
    DecodedEvent {
        schema: schema.to_string(),
        address: "0xc0ffee".into(),
        tx_hash: format!("0x{block:04x}"),
        block_number: block,
        block_timestamp: 1_700_000_000 + block as i64,
        log_index,
        fields_json: fields,
    }
}

pub fn new_asset(block: u64, asset_id: &str) -> DecodedEvent {
    event(
        "LogNewAsset",
        block,
        0,
        json!({ "assetId": asset_id, "name": "BTC", "decimal": 8 }),
    )
}

pub fn new_token(block: u64, token: &str) -> DecodedEvent {
    event(
        "LogNewToken",
        block,
        0,
        json!({ "token": token, "name": "USDT", "decimal": 6 }),
    )
}

pub fn new_pair(block: u64, pair_id: &str, asset_id: &str, token: &str) -> DecodedEvent {
    event(
        "LogNewPair",
        block,
        0,
        json!({ "pairId": pair_id, "assetId": asset_id, "token": token }),
    )
}

pub fn htlc_new(block: u64, hashlock: &str, pair_id: &str) -> DecodedEvent {
    event(
        "LogHTLCNew",
        block,
        0,
        json!({
            "sender": "0x1111111111111111111111111111111111111111",
            "receiver": "0x2222222222222222222222222222222222222222",
            "pairId": pair_id,
            "amount": "0x3e8",
            "hashlock": hashlock,
            "timelock": "0x65f00000",
            "nodePubkey": "0x02abcdef"
        }),
    )
}

pub fn node_minted(block: u64, token_id: u64) -> DecodedEvent {
    event(
        "NodeMinted",
        block,
        0,
        json!({
            "tokenId": format!("{token_id:#x}"),
            "owner": "0xowner",
            "buyer": "0xbuyer"
        }),
    )
}
