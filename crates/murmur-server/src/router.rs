//! Broadcast and direct delivery over the connection registry.
//!
//! Each delivery runs in its own Tokio task. The caller only waits for the
//! registry snapshot, never for a recipient, so one slow peer cannot delay the
//! others or the sender's receive loop. A failed delivery is logged and
//! otherwise ignored; it never touches the registry.

use std::sync::Arc;

use murmur_core::ConnectionId;
use murmur_proto::{ChatMessage, Frame, Payload};
use tracing::{debug, warn};

use crate::{ConnectionRegistry, ServerError, registry::Target};

/// Fan-out and direct-delivery logic.
#[derive(Clone)]
pub struct Router {
    registry: Arc<ConnectionRegistry>,
}

impl Router {
    /// Create a router over `registry`.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this router delivers through.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Deliver `message` to every connection except `exclude`.
    ///
    /// Returns the number of deliveries started.
    ///
    /// # Errors
    ///
    /// - `ServerError::Protocol` if the message cannot be encoded
    pub async fn broadcast(
        &self,
        message: &ChatMessage,
        exclude: Option<ConnectionId>,
    ) -> Result<usize, ServerError> {
        let frame = encode(message)?;
        let targets = self.registry.targets_except(exclude).await;
        let count = targets.len();

        spawn_deliveries(targets, &frame, "broadcast");

        debug!(from = %message.sender_username, recipients = count, "broadcast");
        Ok(count)
    }

    /// Deliver `message` to every connection owned by `username`.
    ///
    /// Returns whether at least one connection matched.
    ///
    /// # Errors
    ///
    /// - `ServerError::Protocol` if the message cannot be encoded
    pub async fn deliver_to_user(
        &self,
        username: &str,
        message: &ChatMessage,
    ) -> Result<bool, ServerError> {
        let frame = encode(message)?;
        let targets = self.registry.targets_for_user(username).await;
        let found = !targets.is_empty();

        spawn_deliveries(targets, &frame, "direct");

        debug!(from = %message.sender_username, to = %username, found, "direct message");
        Ok(found)
    }

    /// Deliver `message` to one connection and wait for the write.
    ///
    /// Used for replies to the sender itself (echo, not-found notices), which
    /// must stay in order with each other.
    ///
    /// # Errors
    ///
    /// - `ServerError::TransportClosed` if `id` is not registered
    /// - any error from the sink
    pub async fn send_to(&self, id: ConnectionId, message: &ChatMessage) -> Result<(), ServerError> {
        let sink = self.registry.sink(id).await.ok_or(ServerError::TransportClosed)?;
        sink.send(&encode(message)?).await
    }
}

fn encode(message: &ChatMessage) -> Result<Frame, ServerError> {
    Ok(Payload::Message(message.clone()).into_frame()?)
}

fn spawn_deliveries(targets: Vec<Target>, frame: &Frame, kind: &'static str) {
    for (id, sink) in targets {
        let frame = frame.clone();
        tokio::spawn(async move {
            if let Err(e) = sink.send(&frame).await {
                warn!(connection = %id, kind, error = %e, "delivery failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::MessageSink;

    /// Records delivered message bodies.
    struct ChannelSink(mpsc::UnboundedSender<ChatMessage>);

    #[async_trait]
    impl MessageSink for ChannelSink {
        async fn send(&self, frame: &Frame) -> Result<(), ServerError> {
            if let Payload::Message(msg) = Payload::from_frame(frame)? {
                self.0.send(msg).map_err(|_| ServerError::TransportClosed)?;
            }
            Ok(())
        }
    }

    /// Never completes a delivery.
    struct StuckSink;

    #[async_trait]
    impl MessageSink for StuckSink {
        async fn send(&self, _frame: &Frame) -> Result<(), ServerError> {
            std::future::pending().await
        }
    }

    /// Always fails.
    struct BrokenSink;

    #[async_trait]
    impl MessageSink for BrokenSink {
        async fn send(&self, _frame: &Frame) -> Result<(), ServerError> {
            Err(ServerError::TransportClosed)
        }
    }

    async fn attach(
        registry: &ConnectionRegistry,
        raw: u64,
        username: &str,
    ) -> mpsc::UnboundedReceiver<ChatMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        registry
            .register(ConnectionId::from_raw(raw), username, Arc::new(ChannelSink(tx)))
            .await
            .unwrap();
        rx
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<ChatMessage>) -> ChatMessage {
        tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn broadcast_skips_excluded() {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = Router::new(Arc::clone(&registry));
        let mut a = attach(&registry, 1, "alice").await;
        let mut b = attach(&registry, 2, "bob").await;
        let mut c = attach(&registry, 3, "carol").await;

        let sent = router
            .broadcast(&ChatMessage::new("alice", "hi"), Some(ConnectionId::from_raw(1)))
            .await
            .unwrap();

        assert_eq!(sent, 2);
        assert_eq!(next(&mut b).await.body, "hi");
        assert_eq!(next(&mut c).await.body, "hi");
        tokio::task::yield_now().await;
        assert!(a.try_recv().is_err());
    }

    #[tokio::test]
    async fn stuck_recipient_does_not_block_others() {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = Router::new(Arc::clone(&registry));
        registry.register(ConnectionId::from_raw(1), "stuck", Arc::new(StuckSink)).await.unwrap();
        registry.register(ConnectionId::from_raw(2), "broken", Arc::new(BrokenSink)).await.unwrap();
        let mut b = attach(&registry, 3, "bob").await;

        let sent = tokio::time::timeout(
            Duration::from_secs(1),
            router.broadcast(&ChatMessage::system("notice"), None),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(sent, 3);
        assert_eq!(next(&mut b).await.body, "notice");
        // Failures never mutate the registry
        assert_eq!(registry.len().await, 3);
    }

    #[tokio::test]
    async fn deliver_to_user_reaches_every_connection_of_user() {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = Router::new(Arc::clone(&registry));
        let mut b1 = attach(&registry, 1, "bob").await;
        let mut b2 = attach(&registry, 2, "bob").await;
        let mut c = attach(&registry, 3, "carol").await;

        let found = router
            .deliver_to_user("bob", &ChatMessage::new("alice", "secret").to("bob"))
            .await
            .unwrap();

        assert!(found);
        assert_eq!(next(&mut b1).await.body, "secret");
        assert_eq!(next(&mut b2).await.body, "secret");
        tokio::task::yield_now().await;
        assert!(c.try_recv().is_err());
    }

    #[tokio::test]
    async fn deliver_to_absent_user_touches_nobody() {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = Router::new(Arc::clone(&registry));
        let mut b = attach(&registry, 1, "bob").await;

        let found = router
            .deliver_to_user("carol", &ChatMessage::new("alice", "x").to("carol"))
            .await
            .unwrap();

        assert!(!found);
        tokio::task::yield_now().await;
        assert!(b.try_recv().is_err());
    }

    /// Records which connection each delivery reached.
    struct TaggedSink {
        raw: u64,
        tx: mpsc::UnboundedSender<u64>,
    }

    #[async_trait]
    impl MessageSink for TaggedSink {
        async fn send(&self, _frame: &Frame) -> Result<(), ServerError> {
            self.tx.send(self.raw).map_err(|_| ServerError::TransportClosed)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn broadcast_racing_unregister_respects_snapshot() {
        for round in 0..20 {
            let registry = Arc::new(ConnectionRegistry::new());
            let router = Router::new(Arc::clone(&registry));
            let (tx, mut rx) = mpsc::unbounded_channel();

            for raw in 1..=32 {
                let sink = Arc::new(TaggedSink { raw, tx: tx.clone() });
                registry.register(ConnectionId::from_raw(raw), "user", sink).await.unwrap();
            }
            drop(tx);

            // Gone before the broadcast starts
            for raw in 1..=8 {
                registry.unregister(ConnectionId::from_raw(raw)).await;
            }

            // Leaving while the broadcast runs
            let churn = {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    for raw in 9..=16 {
                        registry.unregister(ConnectionId::from_raw(raw)).await;
                        tokio::task::yield_now().await;
                    }
                })
            };

            let message = ChatMessage::system(format!("round {round}"));
            let sent = router.broadcast(&message, None).await.unwrap();
            churn.await.unwrap();

            let mut delivered = std::collections::BTreeSet::new();
            for _ in 0..sent {
                let raw =
                    tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
                assert!(delivered.insert(raw), "connection {raw} got the message twice");
            }
            // With the registry gone, every sink drops once its delivery ends
            drop(router);
            drop(registry);
            let extra = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
            assert_eq!(extra, None);

            assert!(delivered.iter().all(|raw| *raw > 8), "removed connection reached");
            assert!((17..=32).all(|raw| delivered.contains(&raw)), "present connection skipped");
            assert_eq!(delivered.len(), sent);
        }
    }

    #[tokio::test]
    async fn send_to_unknown_connection_fails() {
        let router = Router::new(Arc::new(ConnectionRegistry::new()));
        let result = router.send_to(ConnectionId::from_raw(42), &ChatMessage::system("x")).await;
        assert!(matches!(result, Err(ServerError::TransportClosed)));
    }
}
