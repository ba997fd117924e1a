//! Error types for diskgraph

use thiserror::Error;

use crate::graph::NodeId;

/// Result type alias using the diskgraph Error
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the storage engine family
#[derive(Error, Debug)]
pub enum Error {
    /// Underlying seek/read/write failure. Surfaced, never retried;
    /// retry semantics for local file I/O belong to the caller.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A relationship referenced an endpoint absent from the node
    /// store. Endpoints are never auto-created.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// A decoded byte span does not match the expected fixed record
    /// size. Treated as corruption; no partial recovery is attempted.
    #[error("Record size mismatch: expected {expected} bytes, got {actual}")]
    RecordSizeMismatch {
        /// Encoded size the record type expects
        expected: usize,
        /// Size of the byte span actually supplied
        actual: usize,
    },

    /// On-disk state violated a chain invariant (e.g. a relationship
    /// record whose stored source does not match the traversed node).
    #[error("Corruption: {0}")]
    Corruption(String),
}

impl Error {
    /// Create a corruption error
    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::Corruption(msg.into())
    }
}
