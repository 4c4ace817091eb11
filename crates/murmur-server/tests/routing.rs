//! End-to-end routing through real sessions over in-process pipes.
//!
//! Every client here is a full upstream session: handshake, framing and the
//! server's receive loop all run for real; only the socket is replaced by a
//! `tokio::io::duplex` pipe.

use std::time::Duration;

use murmur_client::{TransportError, UpstreamConnector, UpstreamReceiver, UpstreamSender};
use murmur_core::Environment;
use murmur_proto::{ChatMessage, Payload, write_frame};
use murmur_server::{LocalConnector, RegistryConfig, ServerContext, ServerError, run_session};

const NOW: u64 = 1_700_000_000_000;

#[derive(Clone)]
struct FixedClock;

impl Environment for FixedClock {
    fn wall_clock_millis(&self) -> u64 {
        NOW
    }
}

struct Client {
    tx: UpstreamSender,
    rx: UpstreamReceiver,
}

impl Client {
    async fn say(&mut self, body: &str) {
        self.tx.send(&ChatMessage::new("ignored", body)).await.unwrap();
    }

    async fn whisper(&mut self, to: &str, body: &str) {
        self.tx.send(&ChatMessage::new("ignored", body).to(to)).await.unwrap();
    }

    async fn next(&mut self) -> ChatMessage {
        tokio::time::timeout(Duration::from_secs(2), self.rx.recv())
            .await
            .expect("timed out waiting for a message")
            .expect("receive failed")
            .expect("stream finished")
    }

    async fn assert_silent(&mut self) {
        let result = tokio::time::timeout(Duration::from_millis(100), self.rx.recv()).await;
        assert!(result.is_err(), "expected no message, got {result:?}");
    }
}

fn server() -> LocalConnector<FixedClock> {
    LocalConnector::new(ServerContext::new(FixedClock, RegistryConfig::default()))
}

async fn wait_for_connections(connector: &LocalConnector<FixedClock>, expected: usize) {
    for _ in 0..200 {
        if connector.context().registry().len().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("registry never reached {expected} connections");
}

async fn join(connector: &LocalConnector<FixedClock>, username: &str) -> Client {
    let before = connector.context().registry().len().await;
    let session = connector.connect(username).await.unwrap();
    wait_for_connections(connector, before + 1).await;
    let (tx, rx) = session.into_split();
    Client { tx, rx }
}

#[tokio::test]
async fn broadcast_direct_and_missing_recipient() {
    let connector = server();
    let mut a = join(&connector, "A").await;
    let mut b = join(&connector, "B").await;

    assert_eq!(a.next().await.body, "B has joined the chat");

    // Broadcast reaches B, never A
    a.say("hi").await;
    let got = b.next().await;
    assert_eq!((got.sender_username.as_str(), got.body.as_str()), ("A", "hi"));
    a.assert_silent().await;

    // Direct message reaches B and is echoed to A
    a.whisper("B", "secret").await;
    let got = b.next().await;
    assert_eq!(got.body, "secret");
    assert_eq!(got.recipient_username, "B");
    let echo = a.next().await;
    assert_eq!(echo.body, "secret");
    assert_eq!(echo.recipient_username, "B");

    // Absent recipient: echo plus exactly one not-found notice, B untouched
    a.whisper("C", "x").await;
    assert_eq!(a.next().await.body, "x");
    let miss = a.next().await;
    assert!(miss.is_system());
    assert_eq!(miss.body, "User 'C' not found or is offline.");
    a.assert_silent().await;
    b.assert_silent().await;
}

#[tokio::test]
async fn departure_is_announced_once_to_everyone_left() {
    let connector = server();
    let mut a = join(&connector, "A").await;
    let mut b = join(&connector, "B").await;
    let mut c = join(&connector, "C").await;

    assert_eq!(a.next().await.body, "B has joined the chat");
    assert_eq!(a.next().await.body, "C has joined the chat");
    assert_eq!(b.next().await.body, "C has joined the chat");

    a.tx.close().await.unwrap();
    wait_for_connections(&connector, 2).await;

    for client in [&mut b, &mut c] {
        let left = client.next().await;
        assert!(left.is_system());
        assert_eq!(left.body, "A has left the chat");
        client.assert_silent().await;
    }

    // A's stream is finished and A is out of later broadcasts
    assert!(a.rx.recv().await.unwrap().is_none());
    b.say("after").await;
    assert_eq!(c.next().await.body, "after");
}

#[tokio::test]
async fn empty_username_is_rejected_before_anything_else() {
    let connector = server();
    let mut watcher = join(&connector, "watcher").await;

    let session = connector.connect("").await.unwrap();
    let (_tx, mut rx) = session.into_split();

    let err = rx.recv().await.unwrap_err();
    assert!(
        matches!(err, TransportError::HandshakeRejected(ref m) if m == "username cannot be empty")
    );
    assert!(rx.recv().await.unwrap().is_none());

    assert_eq!(connector.context().registry().len().await, 1);
    watcher.assert_silent().await;
}

#[tokio::test]
async fn one_user_many_sessions() {
    let connector = server();
    let mut first = join(&connector, "alice").await;
    let mut second = join(&connector, "alice").await;
    let mut bob = join(&connector, "bob").await;

    assert_eq!(first.next().await.body, "alice has joined the chat");
    assert_eq!(first.next().await.body, "bob has joined the chat");
    assert_eq!(second.next().await.body, "bob has joined the chat");

    bob.whisper("alice", "both of you").await;
    assert_eq!(first.next().await.body, "both of you");
    assert_eq!(second.next().await.body, "both of you");
    assert_eq!(bob.next().await.body, "both of you");

    // A session's own broadcast skips only that session, not its twin
    first.say("from tab one").await;
    assert_eq!(second.next().await.body, "from tab one");
    assert_eq!(bob.next().await.body, "from tab one");
    first.assert_silent().await;
}

#[tokio::test]
async fn server_stamps_time_and_author() {
    let connector = server();
    let mut a = join(&connector, "alice").await;
    let mut b = join(&connector, "bob").await;
    let joined = a.next().await;
    assert_eq!(joined.timestamp, NOW);

    a.tx.send(&ChatMessage::new("mallory", "unstamped")).await.unwrap();
    let got = b.next().await;
    assert_eq!(got.sender_username, "alice");
    assert_eq!(got.timestamp, NOW);

    a.tx.send(&ChatMessage::new("alice", "stamped").at(5)).await.unwrap();
    assert_eq!(b.next().await.timestamp, 5);
}

#[tokio::test]
async fn eof_before_handshake_is_clean() {
    let ctx = ServerContext::new(FixedClock, RegistryConfig::default());
    let (client, server) = tokio::io::duplex(1024);
    drop(client);
    let (read, write) = tokio::io::split(server);

    run_session(read, write, ctx.clone()).await.unwrap();
    assert!(ctx.registry().is_empty().await);
}

#[tokio::test]
async fn malformed_frame_ends_session_with_cleanup() {
    let connector = server();
    let mut watcher = join(&connector, "watcher").await;

    let (mut client, server) = tokio::io::duplex(1024);
    let (read, write) = tokio::io::split(server);
    let ctx = connector.context().clone();
    let session = tokio::spawn(run_session(read, write, ctx));

    let handshake = Payload::from(ChatMessage::new("bad", "has joined")).into_frame().unwrap();
    write_frame(&mut client, &handshake).await.unwrap();
    assert_eq!(watcher.next().await.body, "bad has joined the chat");

    tokio::io::AsyncWriteExt::write_all(&mut client, b"XXXXXXXXXXXXXXXX").await.unwrap();

    let result = session.await.unwrap();
    assert!(matches!(result, Err(ServerError::Protocol(_))));
    assert_eq!(watcher.next().await.body, "bad has left the chat");
    assert_eq!(connector.context().registry().len().await, 1);
}
