//! Read-through access to authoritative HTLC contract state.
//!
//! Withdraw and refund logs only carry the contract id. The preimage and the
//! watcher that settled the HTLC are read from the contract itself
//! (`getContractByKey`) at reconcile time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::IndexerError;

/// Settled state of one HTLC as reported by the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtlcContractState {
    #[serde(default)]
    pub preimage: Option<String>,
    pub watcher: String,
}

/// Port to the deployed HashedTimeLock contract.
#[async_trait]
pub trait ContractStateReader: Send + Sync {
    /// Read the settled state of `contract_id` on the contract at `contract_address`.
    async fn htlc_state(
        &self,
        contract_address: &str,
        contract_id: &str,
    ) -> Result<HtlcContractState, IndexerError>;
}

/// Contract state served from memory, keyed by contract id.
///
/// Used for replays from a state snapshot and in tests. Contract ids are
/// matched case-insensitively; the contract address is not consulted.
#[derive(Debug, Default)]
pub struct MemoryContractState {
    states: RwLock<HashMap<String, HtlcContractState>>,
}

impl MemoryContractState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object `{ "<contractId>": { "preimage": …, "watcher": … } }`.
    pub fn from_json(json: &str) -> Result<Self, IndexerError> {
        let raw: HashMap<String, HtlcContractState> = serde_json::from_str(json)
            .map_err(|e| IndexerError::Config(format!("contract state snapshot: {e}")))?;
        let store = Self::new();
        for (id, state) in raw {
            store.insert(&id, state);
        }
        Ok(store)
    }

    pub fn insert(&self, contract_id: &str, state: HtlcContractState) {
        self.states
            .write()
            .unwrap()
            .insert(contract_id.to_ascii_lowercase(), state);
    }
}

#[async_trait]
impl ContractStateReader for MemoryContractState {
    async fn htlc_state(
        &self,
        _contract_address: &str,
        contract_id: &str,
    ) -> Result<HtlcContractState, IndexerError> {
        self.states
            .read()
            .unwrap()
            .get(&contract_id.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| {
                IndexerError::ContractRead(format!("no contract state for '{contract_id}'"))
            })
    }
}
