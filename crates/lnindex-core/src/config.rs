//! Indexer configuration and its fluent builder.
//!
//! # Example
//!
//! ```rust
//! use lnindex_core::config::IndexerBuilder;
//!
//! let config = IndexerBuilder::new()
//!     .id("astra-mainnet")
//!     .htlc_contract("0x5FbDB2315678afecb367f032d93F642f64180aa3")
//!     .checkpoint_interval(500)
//!     .build_config();
//! assert_eq!(config.checkpoint_interval, 500);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::IndexerError;
use crate::event::ContractFamily;

// ─── ContractAddresses ───────────────────────────────────────────────────────

/// Deployed address per contract family.
///
/// An unset address accepts events of that family from any emitter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAddresses {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub htlc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_nft: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_sale: Option<String>,
}

impl ContractAddresses {
    pub fn get(&self, family: ContractFamily) -> Option<&str> {
        match family {
            ContractFamily::Htlc => self.htlc.as_deref(),
            ContractFamily::NodeNft => self.node_nft.as_deref(),
            ContractFamily::NodeSale => self.node_sale.as_deref(),
        }
    }

    /// Returns `true` if an event of `family` emitted by `address` should be reconciled.
    pub fn accepts(&self, family: ContractFamily, address: &str) -> bool {
        self.get(family)
            .map_or(true, |expected| expected.eq_ignore_ascii_case(address))
    }
}

// ─── LogConfig ───────────────────────────────────────────────────────────────

/// Log level per component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Global default level: "trace" | "debug" | "info" | "warn" | "error"
    #[serde(default = "default_level")]
    pub level: String,
    /// Override per component: component_name → level
    #[serde(default)]
    pub components: HashMap<String, String>,
    /// Emit JSON structured logs (true) or human-readable text (false)
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            components: HashMap::new(),
            json: false,
        }
    }
}

impl LogConfig {
    /// Filter directives such as `"info,lnindex_core=debug"`.
    pub fn directives(&self) -> String {
        let mut components: Vec<_> = self.components.iter().collect();
        components.sort();
        let mut directives = self.level.clone();
        for (component, level) in components {
            directives.push_str(&format!(",{}={}", component.replace('-', "_"), level));
        }
        directives
    }
}

// ─── IndexerConfig ───────────────────────────────────────────────────────────

/// Configuration for an indexer instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Unique name for this indexer (used for checkpoint keys).
    pub id: String,
    /// Chain being indexed (e.g. `"ethereum"`).
    pub chain: String,
    /// Deployed contract addresses.
    pub contracts: ContractAddresses,
    /// Save a checkpoint every N processed events.
    pub checkpoint_interval: u64,
    /// Logging setup for binaries.
    pub log: LogConfig,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            id: "lnindex".into(),
            chain: "ethereum".into(),
            contracts: ContractAddresses::default(),
            checkpoint_interval: 100,
            log: LogConfig::default(),
        }
    }
}

impl IndexerConfig {
    /// Parse a JSON config; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, IndexerError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| IndexerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, IndexerError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| IndexerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), IndexerError> {
        if self.id.is_empty() {
            return Err(IndexerError::Config("id must not be empty".into()));
        }
        if self.checkpoint_interval == 0 {
            return Err(IndexerError::Config(
                "checkpoint_interval must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

// ─── IndexerBuilder ──────────────────────────────────────────────────────────

/// Fluent builder for `IndexerConfig`.
#[derive(Default)]
pub struct IndexerBuilder {
    config: IndexerConfig,
}

impl IndexerBuilder {
    pub fn new() -> Self {
        Self {
            config: IndexerConfig::default(),
        }
    }

    /// Set the indexer ID (used for checkpoint keys).
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.config.id = id.into();
        self
    }

    pub fn chain(mut self, chain: impl Into<String>) -> Self {
        self.config.chain = chain.into();
        self
    }

    pub fn htlc_contract(mut self, address: impl Into<String>) -> Self {
        self.config.contracts.htlc = Some(address.into());
        self
    }

    pub fn node_nft_contract(mut self, address: impl Into<String>) -> Self {
        self.config.contracts.node_nft = Some(address.into());
        self
    }

    pub fn node_sale_contract(mut self, address: impl Into<String>) -> Self {
        self.config.contracts.node_sale = Some(address.into());
        self
    }

    /// Set checkpoint save interval (every N events).
    pub fn checkpoint_interval(mut self, n: u64) -> Self {
        self.config.checkpoint_interval = n;
        self
    }

    pub fn log(mut self, log: LogConfig) -> Self {
        self.config.log = log;
        self
    }

    /// Build the `IndexerConfig`.
    pub fn build_config(self) -> IndexerConfig {
        self.config
    }
}
