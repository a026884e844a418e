//! Persisted entity records and the collections they live in.

use alloy_primitives::U256;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// ─── Collection ──────────────────────────────────────────────────────────────

/// A typed table in the entity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Assets,
    Tokens,
    Pairs,
    Htlcs,
    Nodes,
    NodeEvents,
    MiningRewards,
    NodeSales,
    Purchases,
    NodeBindings,
}

impl Collection {
    pub const ALL: [Collection; 10] = [
        Self::Assets,
        Self::Tokens,
        Self::Pairs,
        Self::Htlcs,
        Self::Nodes,
        Self::NodeEvents,
        Self::MiningRewards,
        Self::NodeSales,
        Self::Purchases,
        Self::NodeBindings,
    ];

    /// Table name used by the storage backends.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assets => "assets",
            Self::Tokens => "tokens",
            Self::Pairs => "pairs",
            Self::Htlcs => "htlcs",
            Self::Nodes => "nodes",
            Self::NodeEvents => "node_events",
            Self::MiningRewards => "mining_rewards",
            Self::NodeSales => "node_sales",
            Self::Purchases => "purchases",
            Self::NodeBindings => "node_bindings",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown collection: {s}"))
    }
}

// ─── Entity ──────────────────────────────────────────────────────────────────

/// A record that can be stored in exactly one [`Collection`].
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;

    fn id(&self) -> &str;
}

macro_rules! entity {
    ($ty:ty, $collection:expr) => {
        impl Entity for $ty {
            const COLLECTION: Collection = $collection;

            fn id(&self) -> &str {
                &self.id
            }
        }
    };
}

// ─── HashedTimeLock ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub name: String,
    pub decimals: u32,
    pub created_at: i64,
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub name: String,
    pub decimals: u32,
    pub created_at: i64,
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub id: String,
    /// Asset id.
    pub asset: String,
    /// Token id.
    pub token: String,
    pub created_at: i64,
    pub tx_hash: String,
}

/// Lifecycle of an HTLC. `Withdrawn` and `Refunded` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtlcState {
    Open,
    Withdrawn,
    Refunded,
}

impl HtlcState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Withdrawn => "withdrawn",
            Self::Refunded => "refunded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Htlc {
    /// Contract id; equal to the hashlock.
    pub id: String,
    pub sender: String,
    pub receiver: String,
    /// Pair id.
    pub pair: String,
    pub amount: U256,
    pub hashlock: String,
    pub timelock: U256,
    pub node_pubkey: String,
    pub withdrawn: bool,
    pub refunded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preimage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watcher: Option<String>,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<i64>,
}

impl Htlc {
    pub fn state(&self) -> HtlcState {
        if self.withdrawn {
            HtlcState::Withdrawn
        } else if self.refunded {
            HtlcState::Refunded
        } else {
            HtlcState::Open
        }
    }
}

// ─── LNNodeNFT ───────────────────────────────────────────────────────────────

/// Node status as emitted by the NFT contract.
///
/// The contract owns the full status table; only the values the indexer
/// assigns itself are named here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeStatus(pub i32);

impl NodeStatus {
    pub const MINTED: NodeStatus = NodeStatus(0);
    pub const ACTIVE: NodeStatus = NodeStatus(2);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Token id, decimal.
    pub id: String,
    pub token_id: U256,
    pub owner: String,
    pub buyer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lnd_pubkey: Option<String>,
    pub status: NodeStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeEventKind {
    Minted,
    NpubBound,
    Activated,
    StatusChanged,
    Transferred,
    RewardsAdded,
    NodeSaleAdded,
    NodePurchased,
}

/// Append-only audit record, one per state-changing log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEvent {
    /// `"{tx_hash}-{log_index}"`.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_sale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer: Option<String>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardType {
    Static,
    Dynamic,
    Airdrop,
}

impl RewardType {
    pub const ALL: [RewardType; 3] = [Self::Static, Self::Dynamic, Self::Airdrop];

    /// Numeric tag used by the contract and in reward ids.
    pub fn index(&self) -> u8 {
        match self {
            Self::Static => 0,
            Self::Dynamic => 1,
            Self::Airdrop => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMiningReward {
    /// `"{token_id}-{reward_type}"`.
    pub id: String,
    pub node: String,
    pub reward_type: RewardType,
    pub total_amount: U256,
    pub claimed_amount: U256,
    pub created_at: i64,
    pub updated_at: i64,
}

impl NodeMiningReward {
    pub fn key(node_id: &str, reward_type: RewardType) -> String {
        format!("{node_id}-{}", reward_type.index())
    }
}

// ─── NodeSale ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSale {
    /// Sale id, decimal.
    pub id: String,
    pub start_time: U256,
    pub title: String,
    pub quote_token: String,
    pub price: U256,
    pub amount: U256,
    pub sold: U256,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    /// `"{tx_hash}-{log_index}"`.
    pub id: String,
    pub buyer: String,
    pub sale_id: U256,
    /// NodeSale id; not guaranteed to resolve.
    pub node_sale: String,
    pub count: U256,
    pub invite_code: String,
    /// Purchase time reported by the sale contract.
    pub timestamp: U256,
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeBinding {
    /// `"{tx_hash}-{log_index}"`.
    pub id: String,
    pub buyer: String,
    pub owner: String,
    pub npub: String,
    pub reward_address: String,
}

entity!(Asset, Collection::Assets);
entity!(Token, Collection::Tokens);
entity!(Pair, Collection::Pairs);
entity!(Htlc, Collection::Htlcs);
entity!(Node, Collection::Nodes);
entity!(NodeEvent, Collection::NodeEvents);
entity!(NodeMiningReward, Collection::MiningRewards);
entity!(NodeSale, Collection::NodeSales);
entity!(Purchase, Collection::Purchases);
entity!(NodeBinding, Collection::NodeBindings);

// ─── Tests ────────────────────────────────────────────────────────────────────
