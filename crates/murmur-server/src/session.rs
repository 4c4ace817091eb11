//! Stream session driver.
//!
//! Runs one [`Session`] state machine against one duplex byte stream:
//! handshake, receive loop, cleanup. Transport-agnostic, so the same driver
//! serves QUIC streams and in-process pipes.

use std::sync::Arc;

use murmur_core::{
    ConnectionId, ConnectionIds, Environment, Route, Session, SessionError, notice,
};
use murmur_proto::{ChatMessage, ErrorPayload, Payload, read_frame, write_frame};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::{ConnectionRegistry, MessageSink, RegistryConfig, Router, ServerError, StreamSink};

/// Everything a session needs from the server. Cheap to clone.
#[derive(Clone)]
pub struct ServerContext<E> {
    router: Router,
    ids: Arc<ConnectionIds>,
    env: E,
    config: RegistryConfig,
}

impl<E: Environment> ServerContext<E> {
    /// Fresh context with an empty registry.
    pub fn new(env: E, config: RegistryConfig) -> Self {
        Self {
            router: Router::new(Arc::new(ConnectionRegistry::new())),
            ids: Arc::new(ConnectionIds::new()),
            env,
            config,
        }
    }

    /// The router shared by every session.
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// The registry shared by every session.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.router.registry()
    }
}

/// Serve one stream until the peer finishes it or it fails.
///
/// The first frame must be a message with a non-empty sender. Otherwise an
/// `Error` frame is written, the stream is finished and the session never
/// becomes active.
///
/// # Errors
///
/// - `ServerError::Session` if the handshake is rejected
/// - `ServerError::Protocol` if the peer sends a malformed frame
/// - `ServerError::DuplicateId` if registration hits an id collision
///
/// Clean end of stream returns `Ok(())`. Cleanup (unregister, leave notice)
/// runs on every exit after a successful handshake.
pub async fn run_session<R, W, E>(
    mut reader: R,
    mut writer: W,
    ctx: ServerContext<E>,
) -> Result<(), ServerError>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send + 'static,
    E: Environment,
{
    let mut session = Session::new();

    let Some(frame) = read_frame(&mut reader).await? else {
        debug!("stream finished before handshake");
        return Ok(());
    };

    let joined = match Payload::from_frame(&frame)? {
        Payload::Message(first) => {
            session.handle_handshake(&first, &ctx.ids, ctx.env.wall_clock_millis())
        },
        Payload::Error(_) => Err(SessionError::InvalidHandshake {
            reason: "handshake must be a chat message".to_string(),
        }),
    };

    let joined = match joined {
        Ok(notice) => notice,
        Err(e) => {
            warn!(error = %e, "handshake rejected");
            reject(&mut writer, &e).await;
            return Err(e.into());
        },
    };

    let (Some(id), Some(username)) = (session.connection_id(), session.username()) else {
        return Err(SessionError::InvalidState { state: session.state(), operation: "register" }
            .into());
    };
    let username = username.to_string();

    let sink: Arc<dyn MessageSink> = Arc::new(StreamSink::new(writer, ctx.config.send_timeout));
    ctx.registry().register(id, username.clone(), Arc::clone(&sink)).await?;

    info!(connection = %id, user = %username, "session joined");

    if let Err(e) = ctx.router.broadcast(&joined, Some(id)).await {
        warn!(connection = %id, error = %e, "join notice failed");
    }

    let result = receive_loop(&mut reader, &session, id, &ctx).await;

    let left = session.close(ctx.env.wall_clock_millis());
    ctx.registry().unregister(id).await;
    if let Some(left) = left {
        if let Err(e) = ctx.router.broadcast(&left, None).await {
            warn!(connection = %id, error = %e, "leave notice failed");
        }
    }
    sink.close().await;

    match &result {
        Ok(()) => info!(connection = %id, user = %username, "session closed"),
        Err(e) => info!(connection = %id, user = %username, error = %e, "session ended"),
    }

    result
}

async fn receive_loop<R, E>(
    reader: &mut R,
    session: &Session,
    id: ConnectionId,
    ctx: &ServerContext<E>,
) -> Result<(), ServerError>
where
    R: AsyncRead + Unpin + Send,
    E: Environment,
{
    while let Some(frame) = read_frame(reader).await? {
        let message = match Payload::from_frame(&frame)? {
            Payload::Message(message) => message,
            Payload::Error(error) => {
                debug!(connection = %id, code = error.code, "ignoring error frame from client");
                continue;
            },
        };

        let now = ctx.env.wall_clock_millis();
        match session.route(message, now)? {
            Route::Broadcast { message, exclude } => {
                ctx.router.broadcast(&message, Some(exclude)).await?;
            },
            Route::Direct { recipient, message } => {
                direct(ctx, id, &recipient, &message, now).await?;
            },
        }
    }

    Ok(())
}

/// Deliver to the recipient, echo to the author, then report a miss.
async fn direct<E: Environment>(
    ctx: &ServerContext<E>,
    id: ConnectionId,
    recipient: &str,
    message: &ChatMessage,
    now: u64,
) -> Result<(), ServerError> {
    let found = ctx.router.deliver_to_user(recipient, message).await?;

    if let Err(e) = ctx.router.send_to(id, message).await {
        warn!(connection = %id, error = %e, "echo failed");
    }

    if !found {
        let miss = notice::recipient_not_found(recipient, now);
        if let Err(e) = ctx.router.send_to(id, &miss).await {
            warn!(connection = %id, error = %e, "not-found notice failed");
        }
    }

    Ok(())
}

async fn reject<W>(writer: &mut W, error: &SessionError)
where
    W: AsyncWrite + Unpin + Send,
{
    let reason = match error {
        SessionError::InvalidHandshake { reason } => reason.clone(),
        other => other.to_string(),
    };

    let frame = match Payload::Error(ErrorPayload::invalid_argument(reason)).into_frame() {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "failed to encode rejection");
            return;
        },
    };

    if let Err(e) = write_frame(writer, &frame).await {
        debug!(error = %e, "failed to send rejection");
    }
    if let Err(e) = writer.shutdown().await {
        debug!(error = %e, "failed to finish rejected stream");
    }
}
