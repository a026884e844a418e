//! Event-to-entity reconcilers.
//!
//! One method per contract event, grouped by emitting contract:
//! [`htlc`] (HashedTimeLock), [`node`] (LNNodeNFT) and [`sale`] (NodeSale).
//! Each method reads what it needs from the [`EntityStore`], stages its
//! writes in a single [`WriteBatch`] and commits it, or returns a skip
//! without writing anything.

pub mod htlc;
pub mod node;
pub mod sale;

use std::sync::Arc;

use tracing::debug;

use crate::config::ContractAddresses;
use crate::contract::ContractStateReader;
use crate::entity::Collection;
use crate::error::{IndexerError, SkipReason};
use crate::event::ChainEvent;
use crate::store::{EntityStore, WriteBatch};
use crate::types::DecodedEvent;

/// Result of reconciling one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// `writes` upserts were committed as one batch.
    Applied { writes: usize },
    /// A precondition did not hold; nothing was written.
    Skipped(SkipReason),
    /// Not an event this indexer handles (unknown schema or foreign emitter).
    Ignored,
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Applies decoded events to an [`EntityStore`].
pub struct Reconciler {
    store: Arc<dyn EntityStore>,
    contracts: Arc<dyn ContractStateReader>,
    addresses: ContractAddresses,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn EntityStore>,
        contracts: Arc<dyn ContractStateReader>,
        addresses: ContractAddresses,
    ) -> Self {
        Self {
            store,
            contracts,
            addresses,
        }
    }

    /// Type `event`, check its emitter, and run the matching reconciler.
    pub async fn apply(&self, event: &DecodedEvent) -> Result<Outcome, IndexerError> {
        let Some(typed) = ChainEvent::from_decoded(event)? else {
            debug!(schema = %event.schema, "no reconciler for schema");
            return Ok(Outcome::Ignored);
        };

        let family = typed.family();
        if !self.addresses.accepts(family, &event.address) {
            debug!(
                schema = %event.schema,
                address = %event.address,
                %family,
                "event from unexpected contract"
            );
            return Ok(Outcome::Ignored);
        }

        let env = event.envelope();
        match typed {
            ChainEvent::NewAsset(p) => self.record_asset(&p, &env).await,
            ChainEvent::NewToken(p) => self.record_token(&p, &env).await,
            ChainEvent::NewPair(p) => self.record_pair(&p, &env).await,
            ChainEvent::HtlcNew(p) => self.create_htlc(&p, &env).await,
            ChainEvent::HtlcWithdraw(p) => self.withdraw(&p, &env).await,
            ChainEvent::HtlcRefund(p) => self.refund(&p, &env).await,
            ChainEvent::NodeMinted(p) => self.mint_node(&p, &env).await,
            ChainEvent::NodeNpubBound(p) => self.bind_npub(&p, &env).await,
            ChainEvent::NodeActivated(p) => self.activate(&p, &env).await,
            ChainEvent::NodeStatusChanged(p) => self.change_status(&p, &env).await,
            ChainEvent::Transfer(p) => self.transfer(&p, &env).await,
            ChainEvent::RewardsAdded(p) => self.add_rewards(&p, &env).await,
            ChainEvent::NodeSaleAdded(p) => self.add_sale(&p, &env).await,
            ChainEvent::NodePurchased(p) => self.record_purchase(&p, &env).await,
            ChainEvent::NodeBinded(p) => self.record_binding(&p, &env).await,
        }
    }

    /// Commit a staged batch.
    async fn commit(&self, batch: WriteBatch) -> Result<Outcome, IndexerError> {
        let writes = batch.len();
        if writes > 0 {
            self.store.commit(batch).await?;
        }
        Ok(Outcome::Applied { writes })
    }
}

fn missing(collection: Collection, id: impl Into<String>) -> Outcome {
    Outcome::Skipped(SkipReason::MissingReference {
        collection,
        id: id.into(),
    })
}

/// Byte-valued ids (hashes, addresses) are keyed in lowercase hex.
fn hex_id(raw: &str) -> String {
    raw.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::MemoryContractState;
    use crate::testing::{event, node_minted, TestStore};
    use serde_json::json;

    fn reconciler(addresses: ContractAddresses) -> (Arc<TestStore>, Reconciler) {
        let store = Arc::new(TestStore::new());
        let r = Reconciler::new(
            store.clone(),
            Arc::new(MemoryContractState::new()),
            addresses,
        );
        (store, r)
    }

    #[tokio::test]
    async fn unknown_schema_is_ignored() {
        let (store, r) = reconciler(ContractAddresses::default());
        let out = r.apply(&event("Approval", 1, 0, json!({}))).await.unwrap();
        assert_eq!(out, Outcome::Ignored);
        assert_eq!(store.count(Collection::NodeEvents).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn foreign_emitter_is_ignored() {
        let (store, r) = reconciler(ContractAddresses {
            node_nft: Some("0xNFT".into()),
            ..Default::default()
        });
        // testing::event emits from 0xc0ffee.
        let out = r.apply(&node_minted(1, 5)).await.unwrap();
        assert_eq!(out, Outcome::Ignored);
        assert_eq!(store.count(Collection::Nodes).await.unwrap(), 0);

        let mut ev = node_minted(2, 5);
        ev.address = "0xnft".into();
        assert!(r.apply(&ev).await.unwrap().is_applied());
        assert_eq!(store.count(Collection::Nodes).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn malformed_known_event_is_fatal() {
        let (_, r) = reconciler(ContractAddresses::default());
        let err = r
            .apply(&event("LogNewPair", 1, 0, json!({ "pairId": 7 })))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::Decode { .. }));
    }

    #[test]
    fn hex_ids_are_lowercased() {
        assert_eq!(hex_id("0xABcd"), "0xabcd");
    }
}
