//! NodeSale reconcilers: sales, purchases and bindings.
//!
//! Purchases are recorded even when their sale is unknown; only the sale's
//! `sold` counter depends on the sale existing. A purchase is counted once:
//! redelivering a purchase log that is already stored leaves `sold` as is,
//! and redelivering the sale itself does not reset it.

use alloy_primitives::U256;
use tracing::{debug, info};

use super::node::node_event;
use super::{Outcome, Reconciler};
use crate::entity::{NodeBinding, NodeEventKind, NodeSale, Purchase};
use crate::error::IndexerError;
use crate::event::{NodeBinded, NodePurchased, NodeSaleAdded};
use crate::store::{load_entity, WriteBatch};
use crate::types::EventEnvelope;

impl Reconciler {
    /// Open a new sale with nothing sold.
    ///
    /// A sale that is already stored keeps its `sold` counter; only the
    /// descriptive fields are overwritten.
    pub async fn add_sale(
        &self,
        p: &NodeSaleAdded,
        env: &EventEnvelope,
    ) -> Result<Outcome, IndexerError> {
        let id = p.id.to_string();
        let sold = load_entity::<NodeSale>(&*self.store, &id)
            .await?
            .map_or(U256::ZERO, |existing| existing.sold);

        let sale = NodeSale {
            id,
            start_time: p.start_time,
            title: p.title.clone(),
            quote_token: p.quote_token.clone(),
            price: p.price,
            amount: p.amount,
            sold,
            enabled: true,
        };
        let mut audit = node_event(env, NodeEventKind::NodeSaleAdded);
        audit.node_sale = Some(sale.id.clone());

        let mut batch = WriteBatch::new();
        batch.put(&sale)?;
        batch.put(&audit)?;
        info!(sale_id = %sale.id, title = %sale.title, amount = %sale.amount, "node sale added");
        self.commit(batch).await
    }

    /// Record a purchase and count it against its sale when the sale exists.
    pub async fn record_purchase(
        &self,
        p: &NodePurchased,
        env: &EventEnvelope,
    ) -> Result<Outcome, IndexerError> {
        let sale_id = p.node_id.to_string();
        let purchase = Purchase {
            id: env.event_key(),
            buyer: p.buyer.clone(),
            sale_id: p.node_id,
            node_sale: sale_id.clone(),
            count: p.count,
            invite_code: p.invite_code.clone(),
            timestamp: p.timestamp,
            tx_hash: env.tx_hash.clone(),
        };

        let already_counted = load_entity::<Purchase>(&*self.store, &purchase.id)
            .await?
            .is_some();

        let mut batch = WriteBatch::new();
        batch.put(&purchase)?;

        match load_entity::<NodeSale>(&*self.store, &sale_id).await? {
            Some(_) if already_counted => {
                debug!(purchase_id = %purchase.id, "purchase already counted");
            }
            Some(mut sale) => {
                sale.sold = sale.sold.checked_add(p.count).ok_or_else(|| {
                    IndexerError::Other(format!("sold counter overflow on sale '{sale_id}'"))
                })?;
                debug!(%sale_id, sold = %sale.sold, "sale counter updated");
                batch.put(&sale)?;
            }
            None => debug!(%sale_id, "purchase for unknown sale; counter not updated"),
        }

        let mut audit = node_event(env, NodeEventKind::NodePurchased);
        audit.node_sale = Some(sale_id.clone());
        audit.buyer = Some(p.buyer.clone());
        batch.put(&audit)?;

        info!(purchase_id = %purchase.id, %sale_id, buyer = %p.buyer, count = %p.count, "node purchased");
        self.commit(batch).await
    }

    pub async fn record_binding(
        &self,
        p: &NodeBinded,
        env: &EventEnvelope,
    ) -> Result<Outcome, IndexerError> {
        let binding = NodeBinding {
            id: env.event_key(),
            buyer: p.buyer.clone(),
            owner: p.owner.clone(),
            npub: p.npub.clone(),
            reward_address: p.reward_address.clone(),
        };
        let mut batch = WriteBatch::new();
        batch.put(&binding)?;
        info!(binding_id = %binding.id, owner = %binding.owner, "node binded");
        self.commit(batch).await
    }
}
