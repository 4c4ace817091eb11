//! Murmur broadcast server.
//!
//! Wraps [`murmur_core`]'s pure session logic with real I/O: Quinn QUIC for
//! transport, Tokio for tasks, and the system clock for timestamps.
//!
//! # Architecture
//!
//! Every QUIC bidirectional stream is one chat session. [`run_session`]
//! drives a [`murmur_core::Session`] over the stream and executes its routing
//! decisions through the [`Router`], which fans out over the shared
//! [`ConnectionRegistry`]. The registry is the only shared mutable state.
//!
//! # Components
//!
//! - [`Server`]: binds the endpoint and spawns a task per connection/stream
//! - [`ConnectionRegistry`]: live connections keyed by id
//! - [`Router`]: broadcast / direct delivery, one task per recipient
//! - [`MessageSink`] / [`StreamSink`]: outbound half of a connection
//! - [`LocalConnector`]: in-process sessions over pipes
//! - [`QuinnTransport`]: QUIC transport via Quinn
//! - [`SystemEnv`]: production environment (real wall clock)

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod local;
mod registry;
mod router;
mod session;
mod sink;
mod system_env;
mod transport;

pub use error::ServerError;
pub use local::LocalConnector;
pub use registry::{ConnectionRegistry, DEFAULT_SEND_TIMEOUT, RegistryConfig, Target};
pub use router::Router;
pub use session::{ServerContext, run_session};
pub use sink::{MessageSink, StreamSink};
pub use system_env::SystemEnv;
pub use transport::{QuinnConnection, QuinnTransport};

/// Address the server binds to when none is configured.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:50051";

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:50051")
    pub bind_address: String,
    /// Path to TLS certificate (PEM format)
    pub cert_path: Option<String>,
    /// Path to TLS private key (PEM format)
    pub key_path: Option<String>,
    /// Delivery settings
    pub registry: RegistryConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            cert_path: None,
            key_path: None,
            registry: RegistryConfig::default(),
        }
    }
}

/// Production Murmur server.
pub struct Server {
    transport: QuinnTransport,
    context: ServerContext<SystemEnv>,
}

impl Server {
    /// Create and bind a new server.
    ///
    /// # Errors
    ///
    /// - `ServerError::Config` / `ServerError::Transport` from
    ///   [`QuinnTransport::bind`]
    pub fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        let transport = QuinnTransport::bind(
            &config.bind_address,
            config.cert_path.as_deref(),
            config.key_path.as_deref(),
        )?;

        Ok(Self { transport, context: ServerContext::new(SystemEnv::new(), config.registry) })
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        self.transport.local_addr()
    }

    /// Shared state handle, e.g. for inspecting the registry.
    pub fn context(&self) -> &ServerContext<SystemEnv> {
        &self.context
    }

    /// Run until the endpoint closes.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Run until `shutdown` completes, then close the endpoint.
    pub async fn run_until(
        self,
        shutdown: impl std::future::Future<Output = ()>,
    ) -> Result<(), ServerError> {
        tracing::info!("Server starting on {}", self.transport.local_addr()?);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("Shutdown requested, closing endpoint");
                    self.transport.close();
                    return Ok(());
                },
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let context = self.context.clone();
                        tokio::spawn(handle_connection(conn, context));
                    },
                    Err(ServerError::TransportClosed) => {
                        tracing::info!("Endpoint closed");
                        return Ok(());
                    },
                    Err(e) => {
                        tracing::error!("Accept error: {}", e);
                    },
                },
            }
        }
    }
}

/// Serve every stream a QUIC connection opens.
async fn handle_connection(conn: QuinnConnection, context: ServerContext<SystemEnv>) {
    let remote = conn.remote_addr();
    tracing::debug!(%remote, "connection accepted");

    while let Ok((send, recv)) = conn.accept_bi().await {
        let context = context.clone();
        tokio::spawn(async move {
            if let Err(e) = run_session(recv, send, context).await {
                tracing::debug!(%remote, error = %e, "session error");
            }
        });
    }
}
