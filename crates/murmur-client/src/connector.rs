//! Session factory abstraction.

use async_trait::async_trait;

use crate::{TransportError, UpstreamSession};

/// Opens upstream sessions for a username.
///
/// Each call yields an independent session with its own connection id on the
/// server, even for a username that already has sessions open.
#[async_trait]
pub trait UpstreamConnector: Send + Sync + 'static {
    /// Open a new stream and send the handshake for `username`.
    ///
    /// # Errors
    ///
    /// - `TransportError::Connection` if the server cannot be reached
    /// - `TransportError::Stream` / `TransportError::Protocol` if the handshake
    ///   cannot be written
    async fn connect(&self, username: &str) -> Result<UpstreamSession, TransportError>;
}
