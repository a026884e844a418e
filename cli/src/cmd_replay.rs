//! `lnindex replay`: feed a JSON-lines event file through the processor.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

use lnindex_core::{
    CheckpointStore, Collection, DecodedEvent, EntityStore, IndexerConfig, MemoryContractState,
    Processor, Reconciler,
};
use lnindex_storage::{InMemoryStorage, SqliteStorage};

pub struct ReplayArgs<'a> {
    pub events: &'a str,
    pub contract_state: Option<&'a str>,
    pub db: Option<&'a str>,
    pub dump: bool,
}

pub async fn run(config: &IndexerConfig, args: ReplayArgs<'_>) -> Result<()> {
    let events = read_events(args.events)?;
    info!(path = args.events, events = events.len(), "events loaded");

    let contracts = match args.contract_state {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("read contract state '{path}'"))?;
            MemoryContractState::from_json(&json)?
        }
        None => MemoryContractState::new(),
    };

    match args.db {
        Some(db) => {
            let store = Arc::new(SqliteStorage::open(db).await?);
            replay_into(store, config, contracts, events, args.dump).await
        }
        None => {
            let store = Arc::new(InMemoryStorage::new());
            replay_into(store, config, contracts, events, args.dump).await
        }
    }
}

async fn replay_into<S>(
    store: Arc<S>,
    config: &IndexerConfig,
    contracts: MemoryContractState,
    events: Vec<DecodedEvent>,
    dump: bool,
) -> Result<()>
where
    S: EntityStore + CheckpointStore + 'static,
{
    let reconciler = Reconciler::new(store.clone(), Arc::new(contracts), config.contracts.clone());
    let mut processor = Processor::new(config, reconciler, Box::new(store.clone()));
    processor.resume().await?;

    let stats = processor.run(futures::stream::iter(events)).await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);

    if dump {
        println!("{}", serde_json::to_string_pretty(&dump_store(&*store).await?)?);
    }
    Ok(())
}

/// Parse one `DecodedEvent` per non-empty line.
fn read_events(path: &str) -> Result<Vec<DecodedEvent>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("read events file '{path}'"))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).with_context(|| format!("{path}:{}: invalid event", n + 1))
        })
        .collect()
}

/// Every collection as `{ collection: { id: document } }`.
async fn dump_store(store: &dyn EntityStore) -> Result<Value> {
    let mut out = Map::new();
    for collection in Collection::ALL {
        let mut docs = Map::new();
        for id in store.ids(collection).await? {
            if let Some(doc) = store.load(collection, &id).await? {
                docs.insert(id, doc);
            }
        }
        out.insert(collection.as_str().to_string(), Value::Object(docs));
    }
    Ok(Value::Object(out))
}
