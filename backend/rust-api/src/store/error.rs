use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by the document store layer.
///
/// Messages are passed through to API callers verbatim, so they must never
/// carry credentials.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A session could not be established (network, auth, server selection).
    #[error("failed to connect to store: {0}")]
    Connect(String),

    /// Enumeration failed, either when opening the cursor or mid-stream.
    #[error("store query failed: {0}")]
    Query(String),

    /// A stored document did not match the expected shape.
    #[error("failed to decode document {key}: {message}")]
    Decode { key: String, message: String },

    /// The bulk write mechanism reported an aggregate failure.
    #[error("store write failed: {0}")]
    Write(String),

    #[error("store operation timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl StoreError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Connect(_) => "connect",
            StoreError::Query(_) => "query",
            StoreError::Decode { .. } => "decode",
            StoreError::Write(_) => "write",
            StoreError::Timeout(_) => "timeout",
        }
    }
}
