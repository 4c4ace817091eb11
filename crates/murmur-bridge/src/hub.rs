//! Registry of bridge clients on this process.
//!
//! The hub knows nothing about usernames or upstream sessions; it maps a
//! [`ClientId`] to that client's [`OutboundQueue`] and fans bridge-local
//! notices out across them.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use tokio::sync::RwLock;

use crate::{BridgeError, OutboundQueue, WireMessage};

/// Identifier of one bridge client, unique within the process.
pub type ClientId = u64;

/// Live bridge clients.
#[derive(Debug)]
pub struct Hub {
    clients: RwLock<HashMap<ClientId, OutboundQueue>>,
    next_id: AtomicU64,
}

impl Hub {
    /// Empty hub.
    pub fn new() -> Self {
        Self { clients: RwLock::new(HashMap::new()), next_id: AtomicU64::new(1) }
    }

    /// Add a client and return its new id.
    pub async fn register(&self, queue: OutboundQueue) -> ClientId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.clients.write().await.insert(id, queue);
        tracing::debug!(client = id, "bridge client registered");
        id
    }

    /// Remove a client. Returns `false` if it was already gone.
    pub async fn unregister(&self, id: ClientId) -> bool {
        self.clients.write().await.remove(&id).is_some()
    }

    /// Close a client's queue and drop it from the hub. Its driver notices the
    /// closed queue and releases the rest of its state.
    pub async fn evict(&self, id: ClientId) {
        if let Some(queue) = self.clients.write().await.remove(&id) {
            queue.close();
            tracing::warn!(client = id, "bridge client evicted");
        }
    }

    /// Queue `message` for every client except `exclude`, without waiting on
    /// any of them. Clients whose queue overflows are evicted. Returns how
    /// many clients accepted the message.
    ///
    /// # Errors
    ///
    /// - `BridgeError::Serialization` if the message cannot be encoded
    pub async fn broadcast_except(
        &self,
        message: &WireMessage,
        exclude: ClientId,
    ) -> Result<usize, BridgeError> {
        let encoded = message.to_json()?;
        let mut delivered = 0;
        let mut overflowed = Vec::new();

        {
            let clients = self.clients.read().await;
            for (&id, queue) in clients.iter().filter(|(id, _)| **id != exclude) {
                match queue.enqueue(encoded.clone()) {
                    Ok(()) => delivered += 1,
                    Err(BridgeError::QueueOverflow) => overflowed.push(id),
                    Err(_) => {},
                }
            }
        }

        for id in overflowed {
            self.evict(id).await;
        }

        Ok(delivered)
    }

    /// Number of registered clients.
    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Whether no client is registered.
    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbound_queue;

    #[tokio::test]
    async fn broadcast_skips_excluded_client() {
        let hub = Hub::new();
        let (qa, mut ra) = outbound_queue(4);
        let (qb, mut rb) = outbound_queue(4);
        let a = hub.register(qa).await;
        let _b = hub.register(qb).await;

        let delivered = hub.broadcast_except(&WireMessage::user_join("alice"), a).await.unwrap();
        assert_eq!(delivered, 1);

        let got = rb.recv().await.unwrap();
        assert!(got.contains(r#""type":"userJoin""#));
        assert!(tokio::time::timeout(std::time::Duration::from_millis(50), ra.recv()).await.is_err());
    }

    #[tokio::test]
    async fn full_queue_is_evicted_without_blocking_others() {
        let hub = Hub::new();
        let (slow, _slow_rx) = outbound_queue(1);
        let (fast, mut fast_rx) = outbound_queue(8);
        let slow_id = hub.register(slow.clone()).await;
        hub.register(fast).await;

        let notice = WireMessage::user_join("x");
        assert_eq!(hub.broadcast_except(&notice, 0).await.unwrap(), 2);
        assert_eq!(hub.broadcast_except(&notice, 0).await.unwrap(), 1);

        assert!(slow.is_closed());
        assert_eq!(hub.len().await, 1);
        assert!(!hub.unregister(slow_id).await);

        fast_rx.recv().await.unwrap();
        fast_rx.recv().await.unwrap();
    }

    #[tokio::test]
    async fn ids_are_unique() {
        let hub = Hub::new();
        let (q, _rx) = outbound_queue(1);
        let first = hub.register(q.clone()).await;
        let second = hub.register(q).await;
        assert_ne!(first, second);
        assert!(hub.unregister(first).await);
        assert!(!hub.unregister(first).await);
    }
}
