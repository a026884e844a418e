//! Shared types for the reconcile pipeline.

use serde::{Deserialize, Serialize};

// ─── DecodedEvent ────────────────────────────────────────────────────────────

/// A decoded contract log, as handed over by the event source.
///
/// Field values stay as JSON until [`crate::event::ChainEvent::from_decoded`]
/// types them, so any ABI decoder that emits named fields can feed the indexer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedEvent {
    /// Event name (e.g. `"LogHTLCNew"`).
    pub schema: String,
    /// Contract address that emitted the event.
    pub address: String,
    /// Transaction hash.
    pub tx_hash: String,
    /// Block number.
    pub block_number: u64,
    /// Unix timestamp of the block (seconds since epoch).
    pub block_timestamp: i64,
    /// Log index within the block.
    pub log_index: u32,
    /// Decoded event parameters keyed by their ABI names.
    #[serde(rename = "fields", alias = "fields_json")]
    pub fields_json: serde_json::Value,
}

impl DecodedEvent {
    /// The envelope fields shared by every event. The tx hash is lowercased.
    pub fn envelope(&self) -> EventEnvelope {
        EventEnvelope {
            block_number: self.block_number,
            block_timestamp: self.block_timestamp,
            tx_hash: self.tx_hash.to_ascii_lowercase(),
            log_index: self.log_index,
            address: self.address.clone(),
        }
    }

    /// Position of this event in canonical chain order.
    pub fn position(&self) -> LogPosition {
        LogPosition::new(self.block_number, self.log_index)
    }
}

// ─── EventEnvelope ───────────────────────────────────────────────────────────

/// Block and transaction context of a single log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub block_number: u64,
    pub block_timestamp: i64,
    pub tx_hash: String,
    pub log_index: u32,
    pub address: String,
}

impl EventEnvelope {
    /// Key for per-log records: `"{tx_hash}-{log_index}"`.
    pub fn event_key(&self) -> String {
        format!("{}-{}", self.tx_hash, self.log_index)
    }
}

// ─── LogPosition ─────────────────────────────────────────────────────────────

/// `(block_number, log_index)`: ordered the way the chain orders logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogPosition {
    pub block_number: u64,
    pub log_index: u32,
}

impl LogPosition {
    pub fn new(block_number: u64, log_index: u32) -> Self {
        Self {
            block_number,
            log_index,
        }
    }
}

impl std::fmt::Display for LogPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.block_number, self.log_index)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_order_by_block_then_log_index() {
        let a = LogPosition::new(100, 7);
        let b = LogPosition::new(100, 8);
        let c = LogPosition::new(101, 0);
        assert!(a < b);
        assert!(b < c);
        assert_eq!(c.to_string(), "101:0");
    }

    #[test]
    fn event_key_joins_tx_hash_and_log_index() {
        let ev = DecodedEvent {
            schema: "NodeMinted".into(),
            address: "0xnft".into(),
            tx_hash: "0xdeadbeef".into(),
            block_number: 12,
            block_timestamp: 1_700_000_000,
            log_index: 3,
            fields_json: serde_json::Value::Null,
        };
        assert_eq!(ev.envelope().event_key(), "0xdeadbeef-3");
        assert_eq!(ev.position(), LogPosition::new(12, 3));
    }

    #[test]
    fn envelope_lowercases_tx_hash() {
        let ev = DecodedEvent {
            schema: "LogNewAsset".into(),
            address: "0xhtlc".into(),
            tx_hash: "0xDEADBEEF".into(),
            block_number: 12,
            block_timestamp: 1_700_000_000,
            log_index: 0,
            fields_json: serde_json::Value::Null,
        };
        let env = ev.envelope();
        assert_eq!(env.tx_hash, "0xdeadbeef");
        assert_eq!(env.event_key(), "0xdeadbeef-0");
    }

    #[test]
    fn decoded_event_reads_jsonl_shape() {
        let line = r#"{"schema":"NodeBinded","address":"0xsale","tx_hash":"0x01",
            "block_number":5,"block_timestamp":1000,"log_index":0,
            "fields":{"buyer":"0xb"}}"#;
        let ev: DecodedEvent = serde_json::from_str(line).unwrap();
        assert_eq!(ev.schema, "NodeBinded");
        assert_eq!(ev.fields_json["buyer"], "0xb");
    }
}
