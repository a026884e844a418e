//! Error types for the reconcile pipeline.

use thiserror::Error;

use crate::entity::Collection;
use crate::types::LogPosition;

/// Fatal errors: the event was not reconciled and must be redelivered.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Contract state read failed: {0}")]
    ContractRead(String),

    #[error("Malformed '{schema}' event: {reason}")]
    Decode { schema: String, reason: String },

    #[error("Event at {got} arrived after {last}")]
    OutOfOrder { last: LogPosition, got: LogPosition },

    #[error("Entity serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    /// Returns `true` if redelivering the same event may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::ContractRead(_))
    }
}

impl From<serde_json::Error> for IndexerError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Why an event was reconciled as a no-op.
///
/// Skips are not errors: the event is considered processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A referenced entity does not exist yet.
    MissingReference { collection: Collection, id: String },
    /// The HTLC already reached a terminal state.
    AlreadyClosed { id: String, state: &'static str },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingReference { collection, id } => {
                write!(f, "missing {collection} '{id}'")
            }
            Self::AlreadyClosed { id, state } => write!(f, "htlc '{id}' already {state}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(IndexerError::Storage("db locked".into()).is_retryable());
        assert!(IndexerError::ContractRead("timeout".into()).is_retryable());
        assert!(!IndexerError::Config("bad".into()).is_retryable());
        assert!(!IndexerError::Serialization("bad doc".into()).is_retryable());
        assert!(!IndexerError::Decode {
            schema: "LogHTLCNew".into(),
            reason: "missing field".into()
        }
        .is_retryable());
    }

    #[test]
    fn corrupt_documents_are_not_retried() {
        let err: IndexerError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, IndexerError::Serialization(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn skip_reason_display() {
        let skip = SkipReason::MissingReference {
            collection: Collection::Pairs,
            id: "0xp1".into(),
        };
        assert_eq!(skip.to_string(), "missing pairs '0xp1'");
    }
}
