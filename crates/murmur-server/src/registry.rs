//! Connection registry for live stream sessions.
//!
//! Maps connection id to the owning username and its outbound sink. The map
//! sits behind a Tokio `RwLock`: register/unregister take the write lock,
//! lookups take the read lock only long enough to snapshot the targets. No
//! send ever happens while the lock is held.

use std::{collections::HashMap, sync::Arc, time::Duration};

use murmur_core::ConnectionId;
use tokio::sync::RwLock;

use crate::{MessageSink, ServerError};

/// Per-recipient send timeout used when none is configured.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivery settings for registered connections.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Upper bound on one frame delivery to one connection
    pub send_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { send_timeout: DEFAULT_SEND_TIMEOUT }
    }
}

/// A delivery target captured from the registry.
pub type Target = (ConnectionId, Arc<dyn MessageSink>);

struct Connection {
    username: String,
    sink: Arc<dyn MessageSink>,
}

/// Thread-safe store of live connections.
///
/// # Invariants
///
/// - Each id maps to at most one connection.
/// - A username may own any number of connections.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection.
    ///
    /// # Errors
    ///
    /// - `ServerError::DuplicateId` if `id` is already registered; the existing
    ///   entry is left untouched
    pub async fn register(
        &self,
        id: ConnectionId,
        username: impl Into<String>,
        sink: Arc<dyn MessageSink>,
    ) -> Result<(), ServerError> {
        let mut connections = self.connections.write().await;
        if connections.contains_key(&id) {
            return Err(ServerError::DuplicateId(id));
        }
        connections.insert(id, Connection { username: username.into(), sink });
        Ok(())
    }

    /// Remove a connection. Returns its username, or `None` if it was not
    /// registered.
    pub async fn unregister(&self, id: ConnectionId) -> Option<String> {
        self.connections.write().await.remove(&id).map(|conn| conn.username)
    }

    /// Every connection except `exclude`.
    pub async fn targets_except(&self, exclude: Option<ConnectionId>) -> Vec<Target> {
        self.connections
            .read()
            .await
            .iter()
            .filter(|(id, _)| Some(**id) != exclude)
            .map(|(id, conn)| (*id, Arc::clone(&conn.sink)))
            .collect()
    }

    /// Every connection owned by `username`.
    pub async fn targets_for_user(&self, username: &str) -> Vec<Target> {
        self.connections
            .read()
            .await
            .iter()
            .filter(|(_, conn)| conn.username == username)
            .map(|(id, conn)| (*id, Arc::clone(&conn.sink)))
            .collect()
    }

    /// Sink for one connection.
    pub async fn sink(&self, id: ConnectionId) -> Option<Arc<dyn MessageSink>> {
        self.connections.read().await.get(&id).map(|conn| Arc::clone(&conn.sink))
    }

    /// Username owning `id`.
    pub async fn username(&self, id: ConnectionId) -> Option<String> {
        self.connections.read().await.get(&id).map(|conn| conn.username.clone())
    }

    /// Whether `id` is registered.
    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.connections.read().await.contains_key(&id)
    }

    /// Number of live connections.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Whether no connections are live.
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}
