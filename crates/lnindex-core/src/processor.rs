//! The event processor: drives the reconciler over an ordered event stream.
//!
//! For each event:
//!   - skip it if it is at or before the resumed checkpoint
//!   - reject it if it goes backwards relative to the last processed event
//!   - reconcile it (one atomic batch)
//!   - advance the cursor and maybe save a checkpoint
//!
//! A fatal error stops the stream with the cursor still on the last event
//! that was fully reconciled, so the failed event is redelivered on retry.

use futures::{Stream, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::checkpoint::{CheckpointManager, CheckpointStore};
use crate::config::IndexerConfig;
use crate::error::IndexerError;
use crate::reconcile::{Outcome, Reconciler};
use crate::types::{DecodedEvent, LogPosition};

/// Counters for one processor run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessStats {
    /// Events handed to the reconciler.
    pub processed: u64,
    /// Events that committed a batch.
    pub applied: u64,
    /// Total upserts committed.
    pub writes: u64,
    /// Events skipped on a missing reference or closed HTLC.
    pub skipped: u64,
    /// Events with no reconciler or from a foreign contract.
    pub ignored: u64,
    /// Events at or before the resumed checkpoint.
    pub resumed: u64,
}

impl ProcessStats {
    fn record(&mut self, outcome: &Outcome) {
        self.processed += 1;
        match outcome {
            Outcome::Applied { writes } => {
                self.applied += 1;
                self.writes += *writes as u64;
            }
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::Ignored => self.ignored += 1,
        }
    }
}

pub struct Processor {
    reconciler: Reconciler,
    checkpoint: CheckpointManager,
    resume_after: Option<LogPosition>,
    last: Option<LogPosition>,
    stats: ProcessStats,
}

impl Processor {
    pub fn new(
        config: &IndexerConfig,
        reconciler: Reconciler,
        checkpoints: Box<dyn CheckpointStore>,
    ) -> Self {
        let checkpoint = CheckpointManager::new(
            checkpoints,
            &config.chain,
            &config.id,
            config.checkpoint_interval,
        );
        Self {
            reconciler,
            checkpoint,
            resume_after: None,
            last: None,
            stats: ProcessStats::default(),
        }
    }

    /// Load the saved checkpoint; events up to it will be skipped.
    pub async fn resume(&mut self) -> Result<Option<LogPosition>, IndexerError> {
        let position = self.checkpoint.load().await?.map(|cp| cp.position());
        if let Some(position) = position {
            info!(%position, "Resuming from checkpoint");
        }
        self.resume_after = position;
        self.last = position;
        Ok(position)
    }

    /// Reconcile a single event in stream order.
    pub async fn process(&mut self, event: &DecodedEvent) -> Result<Outcome, IndexerError> {
        let position = event.position();

        if self.resume_after.is_some_and(|resume| position <= resume) {
            debug!(%position, schema = %event.schema, "already reconciled before checkpoint");
            self.stats.resumed += 1;
            return Ok(Outcome::Ignored);
        }
        if let Some(last) = self.last {
            if position < last {
                return Err(IndexerError::OutOfOrder {
                    last,
                    got: position,
                });
            }
        }

        let outcome = self.reconciler.apply(event).await?;
        self.last = Some(position);
        self.stats.record(&outcome);
        self.checkpoint.maybe_save(position).await?;
        Ok(outcome)
    }

    /// Process every event of `events`, then save a final checkpoint.
    pub async fn run<S>(&mut self, events: S) -> Result<ProcessStats, IndexerError>
    where
        S: Stream<Item = DecodedEvent>,
    {
        futures::pin_mut!(events);
        while let Some(event) = events.next().await {
            if let Err(e) = self.process(&event).await {
                error!(
                    position = %event.position(),
                    schema = %event.schema,
                    error = %e,
                    "event processing failed"
                );
                self.finish().await?;
                return Err(e);
            }
        }
        self.finish().await?;

        info!(
            processed = self.stats.processed,
            applied = self.stats.applied,
            skipped = self.stats.skipped,
            ignored = self.stats.ignored,
            "event stream complete"
        );
        Ok(self.stats.clone())
    }

    /// Persist the cursor immediately.
    pub async fn finish(&mut self) -> Result<(), IndexerError> {
        match self.last {
            Some(last) => self.checkpoint.force_save(last).await,
            None => Ok(()),
        }
    }

    pub fn stats(&self) -> &ProcessStats {
        &self.stats
    }

    /// Position of the last fully reconciled event.
    pub fn last_position(&self) -> Option<LogPosition> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::checkpoint::MemoryCheckpointStore;
    use crate::config::IndexerBuilder;
    use crate::contract::MemoryContractState;
    use crate::entity::Collection;
    use crate::store::EntityStore;
    use crate::testing::{new_asset, new_pair, node_minted, TestStore};

    fn processor(store: Arc<TestStore>, checkpoints: Arc<MemoryCheckpointStore>) -> Processor {
        let config = IndexerBuilder::new().checkpoint_interval(2).build_config();
        let reconciler = Reconciler::new(
            store,
            Arc::new(MemoryContractState::new()),
            config.contracts.clone(),
        );
        Processor::new(&config, reconciler, Box::new(checkpoints))
    }

    #[tokio::test]
    async fn run_collects_stats_and_saves_final_checkpoint() {
        let store = Arc::new(TestStore::new());
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let mut p = processor(store.clone(), checkpoints.clone());

        let events = vec![
            new_asset(1, "0xa1"),
            new_pair(2, "0xp1", "0xa1", "0xt1"), // token missing
            node_minted(3, 5),
        ];
        let stats = p.run(futures::stream::iter(events)).await.unwrap();

        assert_eq!(stats.processed, 3);
        assert_eq!(stats.applied, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.writes, 3);

        let cp = checkpoints.load("ethereum", "lnindex").await.unwrap().unwrap();
        assert_eq!(cp.position(), LogPosition::new(3, 0));
    }

    #[tokio::test]
    async fn backwards_event_is_rejected() {
        let store = Arc::new(TestStore::new());
        let mut p = processor(store.clone(), Arc::new(MemoryCheckpointStore::new()));

        p.process(&node_minted(10, 1)).await.unwrap();
        let err = p.process(&node_minted(9, 2)).await.unwrap_err();
        assert!(matches!(err, IndexerError::OutOfOrder { .. }));
        assert_eq!(p.last_position(), Some(LogPosition::new(10, 0)));
        assert_eq!(store.count(Collection::Nodes).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn same_position_redelivery_is_reapplied() {
        let store = Arc::new(TestStore::new());
        let mut p = processor(store.clone(), Arc::new(MemoryCheckpointStore::new()));

        p.process(&node_minted(10, 1)).await.unwrap();
        let again = p.process(&node_minted(10, 1)).await.unwrap();
        assert!(again.is_applied());
        assert_eq!(store.count(Collection::Nodes).await.unwrap(), 1);
        assert_eq!(store.count(Collection::NodeEvents).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn resume_skips_events_up_to_checkpoint() {
        let store = Arc::new(TestStore::new());
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        {
            let mut first = processor(store.clone(), checkpoints.clone());
            first
                .run(futures::stream::iter(vec![node_minted(1, 1), node_minted(2, 2)]))
                .await
                .unwrap();
        }

        let mut second = processor(store.clone(), checkpoints.clone());
        assert_eq!(second.resume().await.unwrap(), Some(LogPosition::new(2, 0)));
        let stats = second
            .run(futures::stream::iter(vec![
                node_minted(1, 1),
                node_minted(2, 2),
                node_minted(3, 3),
            ]))
            .await
            .unwrap();

        assert_eq!(stats.resumed, 2);
        assert_eq!(stats.processed, 1);
        assert_eq!(store.count(Collection::Nodes).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn fatal_error_stops_the_stream() {
        let store = Arc::new(TestStore::new());
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let mut p = processor(store.clone(), checkpoints.clone());

        let withdraw = crate::testing::event(
            "LogHTLCWithdraw",
            5,
            0,
            serde_json::json!({ "contractId": "0xh" }),
        );
        // The HTLC exists, but no contract state is available to read.
        store
            .upsert(
                Collection::Htlcs,
                "0xh",
                serde_json::json!({
                    "id": "0xh", "sender": "0xs", "receiver": "0xr", "pair": "0xp",
                    "amount": "0x1", "hashlock": "0xh", "timelock": "0x1",
                    "node_pubkey": "0x02", "withdrawn": false, "refunded": false,
                    "created_at": 1
                }),
            )
            .await
            .unwrap();

        let err = p
            .run(futures::stream::iter(vec![
                node_minted(4, 1),
                withdraw,
                node_minted(6, 2),
            ]))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::ContractRead(_)));
        assert_eq!(p.last_position(), Some(LogPosition::new(4, 0)));
        assert_eq!(store.count(Collection::Nodes).await.unwrap(), 1);

        let cp = checkpoints.load("ethereum", "lnindex").await.unwrap().unwrap();
        assert_eq!(cp.position(), LogPosition::new(4, 0));
    }
}
