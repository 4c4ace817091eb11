//! Client error types.

use murmur_proto::ProtocolError;
use thiserror::Error;

/// Errors raised while talking to the broadcast server.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not reach the server.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Stream-level failure after connecting.
    #[error("stream error: {0}")]
    Stream(String),

    /// Peer sent bytes that are not a valid frame.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Server answered the session with an error frame.
    #[error("rejected by server: {0}")]
    HandshakeRejected(String),

    /// Session already closed locally.
    #[error("session closed")]
    Closed,
}
