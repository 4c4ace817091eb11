//! Bridge errors.

use murmur_client::TransportError;
use thiserror::Error;

/// Errors raised by the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Upstream session could not be opened or used
    #[error("upstream error: {0}")]
    Upstream(#[from] TransportError),

    /// Outbound queue was full; the owning client has been evicted
    #[error("outbound queue overflow")]
    QueueOverflow,

    /// Outbound queue is already closed
    #[error("outbound queue closed")]
    QueueClosed,

    /// Wire message could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Socket or listener I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
