//! In-process upstream connector.
//!
//! Runs sessions against a [`ServerContext`] over `tokio::io::duplex` pipes,
//! so the bridge (or a test) can embed the broadcast server without sockets.

use async_trait::async_trait;
use murmur_client::{TransportError, UpstreamConnector, UpstreamSession};
use murmur_core::Environment;

use crate::{ServerContext, run_session};

/// Pipe buffer size per direction.
const PIPE_CAPACITY: usize = 64 * 1024;

/// [`UpstreamConnector`] that spawns a server session per connect.
#[derive(Clone)]
pub struct LocalConnector<E> {
    context: ServerContext<E>,
}

impl<E: Environment> LocalConnector<E> {
    /// Connector serving sessions from `context`.
    pub fn new(context: ServerContext<E>) -> Self {
        Self { context }
    }

    /// The server context sessions run against.
    pub fn context(&self) -> &ServerContext<E> {
        &self.context
    }
}

#[async_trait]
impl<E: Environment> UpstreamConnector for LocalConnector<E> {
    async fn connect(&self, username: &str) -> Result<UpstreamSession, TransportError> {
        let (client, server) = tokio::io::duplex(PIPE_CAPACITY);
        let (server_read, server_write) = tokio::io::split(server);
        let context = self.context.clone();

        tokio::spawn(async move {
            if let Err(e) = run_session(server_read, server_write, context).await {
                tracing::debug!(error = %e, "local session ended with error");
            }
        });

        let (client_read, client_write) = tokio::io::split(client);
        UpstreamSession::establish(client_read, client_write, username).await
    }
}
