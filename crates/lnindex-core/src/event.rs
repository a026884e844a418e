//! Typed contract events.
//!
//! [`ChainEvent::from_decoded`] turns the generic [`DecodedEvent`] (schema name
//! plus JSON fields) into one payload struct per contract event. Field names
//! are the ABI parameter names, so payloads deserialize in camelCase.

use alloy_primitives::U256;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::IndexerError;
use crate::types::DecodedEvent;

/// The contract that emits a given event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractFamily {
    /// HashedTimeLock: assets, tokens, pairs, HTLCs.
    Htlc,
    /// LNNodeNFT: node lifecycle and mining rewards.
    NodeNft,
    /// NodeSale: sales, purchases, bindings.
    NodeSale,
}

impl std::fmt::Display for ContractFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Htlc => write!(f, "htlc"),
            Self::NodeNft => write!(f, "node_nft"),
            Self::NodeSale => write!(f, "node_sale"),
        }
    }
}

// ─── HashedTimeLock payloads ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAsset {
    pub asset_id: String,
    pub name: String,
    pub decimal: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewToken {
    pub token: String,
    pub name: String,
    pub decimal: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPair {
    pub pair_id: String,
    pub asset_id: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HtlcNew {
    pub sender: String,
    pub receiver: String,
    pub pair_id: String,
    pub amount: U256,
    pub hashlock: String,
    pub timelock: U256,
    pub node_pubkey: String,
}

/// Payload of both `LogHTLCWithdraw` and `LogHTLCRefund`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HtlcClose {
    pub contract_id: String,
}

// ─── LNNodeNFT payloads ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMinted {
    pub token_id: U256,
    pub owner: String,
    pub buyer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeNpubBound {
    pub token_id: U256,
    pub node_npub: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeActivated {
    pub token_id: U256,
    pub lnd_pubkey: String,
    pub node_npub: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatusChanged {
    pub token_id: U256,
    pub status: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTransfer {
    pub from: String,
    pub to: String,
    pub token_id: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardsAdded {
    pub token_id: U256,
    pub static_amount: U256,
    pub dynamic_amount: U256,
    pub airdrop_amount: U256,
}

// ─── NodeSale payloads ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSaleAdded {
    pub id: U256,
    pub start_time: U256,
    pub title: String,
    pub quote_token: String,
    pub price: U256,
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePurchased {
    pub buyer: String,
    /// Sale id.
    pub node_id: U256,
    pub count: U256,
    pub invite_code: String,
    pub timestamp: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeBinded {
    pub buyer: String,
    pub owner: String,
    pub npub: String,
    pub reward_address: String,
}

// ─── ChainEvent ──────────────────────────────────────────────────────────────

/// A typed event from one of the indexed contracts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    NewAsset(NewAsset),
    NewToken(NewToken),
    NewPair(NewPair),
    HtlcNew(HtlcNew),
    HtlcWithdraw(HtlcClose),
    HtlcRefund(HtlcClose),
    NodeMinted(NodeMinted),
    NodeNpubBound(NodeNpubBound),
    NodeActivated(NodeActivated),
    NodeStatusChanged(NodeStatusChanged),
    Transfer(NodeTransfer),
    RewardsAdded(RewardsAdded),
    NodeSaleAdded(NodeSaleAdded),
    NodePurchased(NodePurchased),
    NodeBinded(NodeBinded),
}

impl ChainEvent {
    /// Every schema name this crate understands.
    pub const SCHEMAS: [&'static str; 15] = [
        "LogNewAsset",
        "LogNewToken",
        "LogNewPair",
        "LogHTLCNew",
        "LogHTLCWithdraw",
        "LogHTLCRefund",
        "NodeMinted",
        "NodeNpubBound",
        "NodeActivated",
        "NodeStatusChanged",
        "Transfer",
        "RewardsAdded",
        "NodeSaleAdded",
        "NodePurchased",
        "NodeBinded",
    ];

    /// Type the fields of `event`.
    ///
    /// Returns `Ok(None)` for schemas no reconciler handles.
    pub fn from_decoded(event: &DecodedEvent) -> Result<Option<Self>, IndexerError> {
        let typed = match event.schema.as_str() {
            "LogNewAsset" => Self::NewAsset(fields(event)?),
            "LogNewToken" => Self::NewToken(fields(event)?),
            "LogNewPair" => Self::NewPair(fields(event)?),
            "LogHTLCNew" => Self::HtlcNew(fields(event)?),
            "LogHTLCWithdraw" => Self::HtlcWithdraw(fields(event)?),
            "LogHTLCRefund" => Self::HtlcRefund(fields(event)?),
            "NodeMinted" => Self::NodeMinted(fields(event)?),
            "NodeNpubBound" => Self::NodeNpubBound(fields(event)?),
            "NodeActivated" => Self::NodeActivated(fields(event)?),
            "NodeStatusChanged" => Self::NodeStatusChanged(fields(event)?),
            "Transfer" => Self::Transfer(fields(event)?),
            "RewardsAdded" => Self::RewardsAdded(fields(event)?),
            "NodeSaleAdded" => Self::NodeSaleAdded(fields(event)?),
            "NodePurchased" => Self::NodePurchased(fields(event)?),
            "NodeBinded" => Self::NodeBinded(fields(event)?),
            _ => return Ok(None),
        };
        Ok(Some(typed))
    }

    /// The contract family that emits this event.
    pub fn family(&self) -> ContractFamily {
        match self {
            Self::NewAsset(_)
            | Self::NewToken(_)
            | Self::NewPair(_)
            | Self::HtlcNew(_)
            | Self::HtlcWithdraw(_)
            | Self::HtlcRefund(_) => ContractFamily::Htlc,
            Self::NodeMinted(_)
            | Self::NodeNpubBound(_)
            | Self::NodeActivated(_)
            | Self::NodeStatusChanged(_)
            | Self::Transfer(_)
            | Self::RewardsAdded(_) => ContractFamily::NodeNft,
            Self::NodeSaleAdded(_) | Self::NodePurchased(_) | Self::NodeBinded(_) => {
                ContractFamily::NodeSale
            }
        }
    }
}

fn fields<T: DeserializeOwned>(event: &DecodedEvent) -> Result<T, IndexerError> {
    T::deserialize(&event.fields_json).map_err(|e| IndexerError::Decode {
        schema: event.schema.clone(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::event;
    use serde_json::json;

    #[test]
    fn decodes_htlc_new() {
        let ev = event(
            "LogHTLCNew",
            1,
            0,
            json!({
                "sender": "0xs",
                "receiver": "0xr",
                "pairId": "0xp",
                "amount": "0x3e8",
                "hashlock": "0xh",
                "timelock": "0x10",
                "nodePubkey": "0x02"
            }),
        );
        let Some(ChainEvent::HtlcNew(p)) = ChainEvent::from_decoded(&ev).unwrap() else {
            panic!("expected HtlcNew");
        };
        assert_eq!(p.amount, U256::from(1000u64));
        assert_eq!(p.timelock, U256::from(16u64));
        assert_eq!(p.pair_id, "0xp");
    }

    #[test]
    fn unknown_schema_is_ignored() {
        let ev = event("Approval", 1, 0, json!({}));
        assert!(ChainEvent::from_decoded(&ev).unwrap().is_none());
    }

    #[test]
    fn missing_field_is_a_decode_error() {
        let ev = event("NodeMinted", 1, 0, json!({ "tokenId": "0x1", "owner": "0xo" }));
        let err = ChainEvent::from_decoded(&ev).unwrap_err();
        assert!(matches!(err, IndexerError::Decode { ref schema, .. } if schema == "NodeMinted"));
    }

    #[test]
    fn families_follow_emitting_contract() {
        let transfer = event(
            "Transfer",
            1,
            0,
            json!({ "from": "0xa", "to": "0xb", "tokenId": "0x5" }),
        );
        let typed = ChainEvent::from_decoded(&transfer).unwrap().unwrap();
        assert_eq!(typed.family(), ContractFamily::NodeNft);

        let binding = event(
            "NodeBinded",
            1,
            0,
            json!({ "buyer": "0xa", "owner": "0xb", "npub": "npub1", "rewardAddress": "0xc" }),
        );
        let typed = ChainEvent::from_decoded(&binding).unwrap().unwrap();
        assert_eq!(typed.family(), ContractFamily::NodeSale);
    }

    #[test]
    fn every_listed_schema_is_recognized() {
        for schema in ChainEvent::SCHEMAS {
            let ev = event(schema, 1, 0, json!({}));
            // Known schemas fail on empty fields rather than being ignored.
            assert!(ChainEvent::from_decoded(&ev).is_err(), "{schema}");
        }
    }
}
