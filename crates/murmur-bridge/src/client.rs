//! Per-client driver: one browser socket, one upstream session.
//!
//! [`serve_client`] runs three cooperating pieces for each connection:
//!
//! - the reader (this task): parses wire messages, handles `join`/`chat`,
//!   and enforces the liveness deadline and read limit
//! - the write pump: drains the [`OutboundQueue`] onto the socket and sends
//!   heartbeat pings once the client has joined
//! - the relay (after `join`): translates upstream messages into wire
//!   messages and queues them
//!
//! Closing the queue is the shared stop signal. Whichever piece fails first
//! closes it and the reader tears everything down.

use std::{
    fmt::Display,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use murmur_client::{TransportError, UpstreamReceiver, UpstreamSender, UpstreamSession};
use murmur_proto::{ChatMessage, SYSTEM_SENDER};
use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

use crate::{
    BridgeConfig, BridgeError, BridgeState, ClientId, Hub, OutboundQueue, OutboundReceiver,
    WireKind, WireMessage, outbound_queue,
};

/// Drive one bridge client until it disconnects, fails, or is evicted.
///
/// `sink` and `stream` are the two halves of the client's socket; tests pass
/// in-memory channels instead.
pub async fn serve_client<Si, St, E>(sink: Si, mut stream: St, state: BridgeState)
where
    Si: Sink<Message> + Send + Unpin + 'static,
    Si::Error: Display,
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let (queue, outbound) = outbound_queue(state.config().queue_capacity);
    let id = state.hub().register(queue.clone()).await;
    let heartbeat = Arc::new(AtomicBool::new(false));

    let writer = tokio::spawn(write_pump(
        sink,
        outbound,
        queue.clone(),
        heartbeat.clone(),
        state.config().clone(),
    ));

    let mut client = Client { id, queue, state, heartbeat, joined: None };
    client.read_loop(&mut stream).await;
    client.teardown().await;

    if let Err(e) = writer.await {
        tracing::debug!(client = id, error = %e, "write pump ended abnormally");
    }
}

struct Client {
    id: ClientId,
    queue: OutboundQueue,
    state: BridgeState,
    heartbeat: Arc<AtomicBool>,
    joined: Option<Joined>,
}

struct Joined {
    username: String,
    upstream: UpstreamSender,
    relay: JoinHandle<()>,
}

impl Client {
    async fn read_loop<St, E>(&mut self, stream: &mut St)
    where
        St: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        let pong_wait = self.state.config().pong_wait;
        let max_size = self.state.config().max_message_size;
        let mut deadline: Option<Instant> = None;

        loop {
            let next = tokio::select! {
                biased;
                () = self.queue.closed() => {
                    tracing::debug!(client = self.id, "outbound queue closed");
                    return;
                },
                () = expired(deadline) => {
                    tracing::info!(client = self.id, "heartbeat timed out");
                    return;
                },
                next = stream.next() => next,
            };

            let payload = match next {
                None | Some(Ok(Message::Close(_))) => {
                    tracing::debug!(client = self.id, "client disconnected");
                    return;
                },
                Some(Err(e)) => {
                    tracing::debug!(client = self.id, error = %e, "socket read failed");
                    return;
                },
                Some(Ok(Message::Pong(_))) => {
                    if deadline.is_some() {
                        deadline = Some(Instant::now() + pong_wait);
                    }
                    continue;
                },
                Some(Ok(Message::Ping(_))) => continue,
                Some(Ok(Message::Text(text))) => text.into_bytes(),
                Some(Ok(Message::Binary(bytes))) => bytes,
            };

            if payload.len() > max_size {
                tracing::warn!(
                    client = self.id,
                    size = payload.len(),
                    limit = max_size,
                    "message exceeds read limit"
                );
                return;
            }

            match WireMessage::parse(&payload) {
                Ok(message) => self.handle(message).await,
                Err(e) => tracing::debug!(client = self.id, error = %e, "ignoring malformed message"),
            }

            if deadline.is_none() && self.joined.is_some() {
                deadline = Some(Instant::now() + pong_wait);
            }
        }
    }

    async fn handle(&mut self, message: WireMessage) {
        match message.kind {
            WireKind::Join => self.join(message.user).await,
            WireKind::Chat => self.chat(message).await,
            kind => tracing::debug!(client = self.id, ?kind, "ignoring message type"),
        }
    }

    async fn join(&mut self, username: String) {
        if self.joined.is_some() {
            self.send_local(&WireMessage::error("Already joined")).await;
            return;
        }
        if username.is_empty() {
            self.send_local(&WireMessage::error("Username cannot be empty")).await;
            return;
        }
        if username == SYSTEM_SENDER {
            self.send_local(&WireMessage::error("Username is reserved")).await;
            return;
        }

        let session = match self.open_upstream(&username).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(client = self.id, user = %username, error = %e, "upstream connect failed");
                let text = match e {
                    BridgeError::Upstream(TransportError::Connection(_)) => {
                        "Failed to connect to chat server"
                    },
                    _ => "Failed to join chat",
                };
                self.send_local(&WireMessage::error(text)).await;
                return;
            },
        };

        let (upstream, receiver) = session.into_split();
        let relay =
            tokio::spawn(relay(receiver, self.queue.clone(), self.state.hub().clone(), self.id));

        self.state.presence().join(&username).await;
        self.joined = Some(Joined { username: username.clone(), upstream, relay });
        self.heartbeat.store(true, Ordering::Release);

        tracing::info!(client = self.id, user = %username, "client joined");

        if let Err(e) =
            self.state.hub().broadcast_except(&WireMessage::user_join(&username), self.id).await
        {
            tracing::warn!(client = self.id, error = %e, "failed to announce join");
        }

        let users = self.state.presence().online_users().await;
        self.send_local(&WireMessage::user_list(users)).await;
    }

    async fn open_upstream(&self, username: &str) -> Result<UpstreamSession, BridgeError> {
        Ok(self.state.connector().connect(username).await?)
    }

    async fn chat(&mut self, message: WireMessage) {
        let Some(joined) = self.joined.as_mut() else {
            self.send_local(&WireMessage::error("Not connected to chat server")).await;
            return;
        };

        let recipient = message.recipient_user;
        if !recipient.is_empty() {
            if recipient == joined.username {
                self.send_local(&WireMessage::error("Cannot send a direct message to yourself"))
                    .await;
                return;
            }
            if self.state.config().strict_direct_targets
                && !self.state.presence().is_online(&recipient).await
            {
                let notice = murmur_core::notice::recipient_not_found(&recipient, now_millis());
                self.send_local(&WireMessage::from(&notice)).await;
                return;
            }
        }

        let upstream = ChatMessage::new(joined.username.clone(), message.text).to(recipient);
        if let Err(e) = joined.upstream.send(&upstream).await {
            tracing::warn!(client = self.id, error = %e, "upstream send failed");
            self.send_local(&WireMessage::error("Failed to send message")).await;
        }
    }

    /// Queue a message for this client only.
    async fn send_local(&self, message: &WireMessage) {
        let encoded = match message.to_json() {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!(client = self.id, error = %e, "failed to encode message");
                return;
            },
        };

        if let Err(BridgeError::QueueOverflow) = self.queue.enqueue(encoded) {
            self.state.hub().evict(self.id).await;
        }
    }

    async fn teardown(mut self) {
        self.queue.close();
        self.state.hub().unregister(self.id).await;

        let Some(mut joined) = self.joined.take() else {
            tracing::debug!(client = self.id, "client closed before joining");
            return;
        };

        self.state.presence().leave(&joined.username).await;

        let timeout = self.state.config().write_timeout;
        match tokio::time::timeout(timeout, joined.upstream.close()).await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => tracing::debug!(client = self.id, error = %e, "upstream close failed"),
            Err(_) => tracing::debug!(client = self.id, "upstream close timed out"),
        }
        joined.relay.abort();

        tracing::info!(client = self.id, user = %joined.username, "client left");
    }
}

/// Forward upstream messages into the client's queue until either side ends.
/// An upstream that finishes or fails closes the queue, which tears the
/// client down.
async fn relay(
    mut upstream: UpstreamReceiver,
    queue: OutboundQueue,
    hub: Arc<Hub>,
    id: ClientId,
) {
    loop {
        let message = match upstream.recv().await {
            Ok(Some(message)) => WireMessage::from(&message),
            Ok(None) => {
                tracing::info!(client = id, "upstream session finished");
                queue.close();
                return;
            },
            Err(TransportError::HandshakeRejected(reason)) => {
                tracing::warn!(client = id, %reason, "upstream rejected session");
                WireMessage::error(reason)
            },
            Err(e) => {
                tracing::warn!(client = id, error = %e, "upstream receive failed");
                queue.close();
                return;
            },
        };

        let encoded = match message.to_json() {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!(client = id, error = %e, "failed to encode relayed message");
                continue;
            },
        };

        match queue.enqueue(encoded) {
            Ok(()) => {},
            Err(BridgeError::QueueOverflow) => {
                hub.evict(id).await;
                return;
            },
            Err(_) => return,
        }
    }
}

/// Drain the queue onto the socket, pinging once the client has joined.
///
/// Once the queue closes, whatever is still buffered is flushed before the
/// close frame.
async fn write_pump<Si>(
    mut sink: Si,
    mut outbound: OutboundReceiver,
    queue: OutboundQueue,
    heartbeat: Arc<AtomicBool>,
    config: BridgeConfig,
) where
    Si: Sink<Message> + Unpin,
    Si::Error: Display,
{
    let period = config.heartbeat_interval;
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let frame = tokio::select! {
            biased;
            () = queue.closed() => {
                flush_and_close(&mut sink, &mut outbound, config.write_timeout).await;
                return;
            },
            next = outbound.recv() => match next {
                Some(text) => Message::Text(text.to_string()),
                None => break,
            },
            _ = ticker.tick() => {
                if !heartbeat.load(Ordering::Acquire) {
                    continue;
                }
                Message::Ping(Vec::new())
            },
        };

        if !write(&mut sink, frame, config.write_timeout).await {
            break;
        }
    }

    queue.close();
}

async fn flush_and_close<Si>(sink: &mut Si, outbound: &mut OutboundReceiver, timeout: Duration)
where
    Si: Sink<Message> + Unpin,
    Si::Error: Display,
{
    while let Some(text) = outbound.try_recv() {
        if !write(sink, Message::Text(text.to_string()), timeout).await {
            return;
        }
    }
    write(sink, Message::Close(None), timeout).await;
}

/// One bounded socket write. Returns `false` if the socket is unusable.
async fn write<Si>(sink: &mut Si, frame: Message, timeout: Duration) -> bool
where
    Si: Sink<Message> + Unpin,
    Si::Error: Display,
{
    match tokio::time::timeout(timeout, sink.send(frame)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "socket write failed");
            false
        },
        Err(_) => {
            tracing::warn!(?timeout, "socket write timed out");
            false
        },
    }
}

/// Resolves at `deadline`, or never if there is none.
async fn expired(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}
