//! Server error types.

use std::time::Duration;

use murmur_core::{ConnectionId, SessionError};
use murmur_proto::ProtocolError;
use thiserror::Error;

/// Errors that can occur in the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error (invalid bind address, unreadable TLS files).
    ///
    /// Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport/network error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Peer sent bytes that are not a valid frame. Fatal for that session.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A connection id was registered twice. Indicates a bug.
    #[error("connection id already registered: {0}")]
    DuplicateId(ConnectionId),

    /// The endpoint or stream is gone.
    #[error("transport closed")]
    TransportClosed,

    /// A single delivery did not complete in time.
    #[error("send timed out after {0:?}")]
    SendTimeout(Duration),

    /// Session state machine rejected the stream.
    #[error("session error: {0}")]
    Session(#[from] SessionError),
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
