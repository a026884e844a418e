//! LNNodeNFT reconcilers: node lifecycle, audit events and mining rewards.
//!
//! Every applied node mutation also appends a [`NodeEvent`] keyed by the
//! log that caused it. Mutations of an unknown token are skipped.

use alloy_primitives::U256;
use tracing::{error, info};

use super::{missing, Outcome, Reconciler};
use crate::entity::{
    Collection, Node, NodeEvent, NodeEventKind, NodeMiningReward, NodeStatus, RewardType,
};
use crate::error::IndexerError;
use crate::event::{
    NodeActivated, NodeMinted, NodeNpubBound, NodeStatusChanged, NodeTransfer, RewardsAdded,
};
use crate::store::{load_entity, WriteBatch};
use crate::types::EventEnvelope;

pub(crate) fn node_event(env: &EventEnvelope, kind: NodeEventKind) -> NodeEvent {
    NodeEvent {
        id: env.event_key(),
        kind,
        node: None,
        node_sale: None,
        buyer: None,
        timestamp: env.block_timestamp,
    }
}

impl Reconciler {
    pub async fn mint_node(
        &self,
        p: &NodeMinted,
        env: &EventEnvelope,
    ) -> Result<Outcome, IndexerError> {
        let node = Node {
            id: p.token_id.to_string(),
            token_id: p.token_id,
            owner: p.owner.clone(),
            buyer: p.buyer.clone(),
            npub: None,
            lnd_pubkey: None,
            status: NodeStatus::MINTED,
            created_at: env.block_timestamp,
            updated_at: env.block_timestamp,
        };
        info!(token_id = %node.id, owner = %node.owner, "node minted");
        self.commit_node(node, env, NodeEventKind::Minted).await
    }

    pub async fn bind_npub(
        &self,
        p: &NodeNpubBound,
        env: &EventEnvelope,
    ) -> Result<Outcome, IndexerError> {
        let mut node = match self.existing_node(&p.token_id, "npub bound").await? {
            Ok(node) => node,
            Err(skip) => return Ok(skip),
        };
        node.npub = Some(p.node_npub.clone());
        node.updated_at = env.block_timestamp;
        self.commit_node(node, env, NodeEventKind::NpubBound).await
    }

    /// Record the node's Lightning identity and mark it active.
    pub async fn activate(
        &self,
        p: &NodeActivated,
        env: &EventEnvelope,
    ) -> Result<Outcome, IndexerError> {
        let mut node = match self.existing_node(&p.token_id, "activated").await? {
            Ok(node) => node,
            Err(skip) => return Ok(skip),
        };
        node.lnd_pubkey = Some(p.lnd_pubkey.clone());
        node.npub = Some(p.node_npub.clone());
        node.status = NodeStatus::ACTIVE;
        node.updated_at = env.block_timestamp;
        info!(token_id = %node.id, lnd_pubkey = %p.lnd_pubkey, "node activated");
        self.commit_node(node, env, NodeEventKind::Activated).await
    }

    /// Store the status reported by the contract, whatever its value.
    pub async fn change_status(
        &self,
        p: &NodeStatusChanged,
        env: &EventEnvelope,
    ) -> Result<Outcome, IndexerError> {
        let mut node = match self.existing_node(&p.token_id, "status changed").await? {
            Ok(node) => node,
            Err(skip) => return Ok(skip),
        };
        node.status = NodeStatus(p.status);
        node.updated_at = env.block_timestamp;
        self.commit_node(node, env, NodeEventKind::StatusChanged).await
    }

    pub async fn transfer(
        &self,
        p: &NodeTransfer,
        env: &EventEnvelope,
    ) -> Result<Outcome, IndexerError> {
        let mut node = match self.existing_node(&p.token_id, "transfer").await? {
            Ok(node) => node,
            Err(skip) => return Ok(skip),
        };
        node.owner = p.to.clone();
        node.updated_at = env.block_timestamp;
        self.commit_node(node, env, NodeEventKind::Transferred).await
    }

    /// Grant static, dynamic and airdrop rewards to a node in one batch.
    pub async fn add_rewards(
        &self,
        p: &RewardsAdded,
        env: &EventEnvelope,
    ) -> Result<Outcome, IndexerError> {
        let node = match self.existing_node(&p.token_id, "rewards added").await? {
            Ok(node) => node,
            Err(skip) => return Ok(skip),
        };

        let mut batch = WriteBatch::new();
        for reward_type in RewardType::ALL {
            let total_amount = match reward_type {
                RewardType::Static => p.static_amount,
                RewardType::Dynamic => p.dynamic_amount,
                RewardType::Airdrop => p.airdrop_amount,
            };
            batch.put(&NodeMiningReward {
                id: NodeMiningReward::key(&node.id, reward_type),
                node: node.id.clone(),
                reward_type,
                total_amount,
                claimed_amount: U256::ZERO,
                created_at: env.block_timestamp,
                updated_at: env.block_timestamp,
            })?;
        }
        let mut audit = node_event(env, NodeEventKind::RewardsAdded);
        audit.node = Some(node.id.clone());
        batch.put(&audit)?;

        info!(
            token_id = %node.id,
            static_amount = %p.static_amount,
            dynamic_amount = %p.dynamic_amount,
            airdrop_amount = %p.airdrop_amount,
            "rewards added"
        );
        self.commit(batch).await
    }

    async fn existing_node(
        &self,
        token_id: &U256,
        action: &str,
    ) -> Result<Result<Node, Outcome>, IndexerError> {
        let id = token_id.to_string();
        match load_entity::<Node>(&*self.store, &id).await? {
            Some(node) => Ok(Ok(node)),
            None => {
                error!(token_id = %id, "node {action}: node not found");
                Ok(Err(missing(Collection::Nodes, id)))
            }
        }
    }

    /// Upsert `node` together with its audit event.
    async fn commit_node(
        &self,
        node: Node,
        env: &EventEnvelope,
        kind: NodeEventKind,
    ) -> Result<Outcome, IndexerError> {
        let mut audit = node_event(env, kind);
        audit.node = Some(node.id.clone());

        let mut batch = WriteBatch::new();
        batch.put(&node)?;
        batch.put(&audit)?;
        self.commit(batch).await
    }
}
