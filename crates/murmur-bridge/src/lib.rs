//! Murmur WebSocket bridge.
//!
//! Browsers speak JSON over WebSocket; the broadcast server speaks framed
//! CBOR over QUIC. The bridge terminates each browser connection, opens a
//! private upstream session for it on `join`, and translates in both
//! directions.
//!
//! # Components
//!
//! - [`serve`] / [`routes::router`]: axum server with `/ws`, `/ping` and
//!   `/api/users`
//! - [`serve_client`]: per-client driver (join, chat, heartbeat, relay)
//! - [`Hub`]: clients on this bridge and bridge-local broadcasts
//! - [`OutboundQueue`]: bounded per-client queue that evicts on overflow
//! - [`PresenceTracker`]: usernames online through this bridge
//! - [`WireMessage`]: the JSON wire format

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod config;
mod error;
mod hub;
mod presence;
mod queue;
pub mod routes;
mod wire;

use std::{future::Future, sync::Arc};

use murmur_client::UpstreamConnector;
use tokio::net::TcpListener;

pub use client::serve_client;
pub use config::{BridgeConfig, DEFAULT_BIND_ADDRESS, DEFAULT_UPSTREAM_ADDRESS};
pub use error::BridgeError;
pub use hub::{ClientId, Hub};
pub use presence::PresenceTracker;
pub use queue::{Outbound, OutboundQueue, OutboundReceiver, outbound_queue};
pub use wire::{WireKind, WireMessage};

/// State shared by every route and client driver.
#[derive(Clone)]
pub struct BridgeState {
    hub: Arc<Hub>,
    presence: Arc<PresenceTracker>,
    connector: Arc<dyn UpstreamConnector>,
    config: Arc<BridgeConfig>,
}

impl BridgeState {
    /// Fresh state opening upstream sessions through `connector`.
    pub fn new(config: BridgeConfig, connector: Arc<dyn UpstreamConnector>) -> Self {
        Self {
            hub: Arc::new(Hub::new()),
            presence: Arc::new(PresenceTracker::new()),
            connector,
            config: Arc::new(config),
        }
    }

    /// Clients connected to this bridge.
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Users online through this bridge.
    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    /// Upstream session factory.
    pub fn connector(&self) -> &dyn UpstreamConnector {
        self.connector.as_ref()
    }

    /// Runtime settings.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}

/// Serve the bridge on `listener` until `shutdown` completes.
///
/// # Errors
///
/// - `BridgeError::Io` if the listener fails
pub async fn serve(
    listener: TcpListener,
    state: BridgeState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), BridgeError> {
    tracing::info!("Bridge listening on {}", listener.local_addr()?);
    axum::serve(listener, routes::router(state)).with_graceful_shutdown(shutdown).await?;
    Ok(())
}
