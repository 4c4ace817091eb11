//! Upstream session over a duplex byte stream.

use std::fmt;

use murmur_proto::{ChatMessage, Payload, read_frame, write_frame};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::TransportError;

/// Body of the handshake message. The server only looks at the sender.
pub const HANDSHAKE_BODY: &str = "has joined";

type BoxedReader = Box<dyn AsyncRead + Send + Sync + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Sync + Unpin>;

/// An established upstream session for one user.
///
/// The handshake has been written; the server does not acknowledge a valid
/// handshake, so a rejection only shows up on the first
/// [`UpstreamReceiver::recv`].
pub struct UpstreamSession {
    username: String,
    sender: UpstreamSender,
    receiver: UpstreamReceiver,
}

impl UpstreamSession {
    /// Send the handshake for `username` over `writer` and wrap both halves.
    ///
    /// # Errors
    ///
    /// - `TransportError::Protocol` if the handshake cannot be written
    pub async fn establish<R, W>(
        reader: R,
        writer: W,
        username: &str,
    ) -> Result<Self, TransportError>
    where
        R: AsyncRead + Send + Sync + Unpin + 'static,
        W: AsyncWrite + Send + Sync + Unpin + 'static,
    {
        let mut sender = UpstreamSender { writer: Some(Box::new(writer)) };
        sender.send(&ChatMessage::new(username, HANDSHAKE_BODY)).await?;

        tracing::debug!(user = %username, "upstream handshake sent");

        Ok(Self {
            username: username.to_string(),
            sender,
            receiver: UpstreamReceiver { reader: Box::new(reader) },
        })
    }

    /// Username this session was opened for.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Split into independently owned halves.
    #[must_use]
    pub fn into_split(self) -> (UpstreamSender, UpstreamReceiver) {
        (self.sender, self.receiver)
    }
}

impl fmt::Debug for UpstreamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamSession").field("username", &self.username).finish_non_exhaustive()
    }
}

/// Write half of an upstream session.
pub struct UpstreamSender {
    writer: Option<BoxedWriter>,
}

impl UpstreamSender {
    /// Send one message upstream.
    ///
    /// # Errors
    ///
    /// - `TransportError::Closed` after [`Self::close`]
    /// - `TransportError::Protocol` if encoding or writing fails
    pub async fn send(&mut self, message: &ChatMessage) -> Result<(), TransportError> {
        let writer = self.writer.as_mut().ok_or(TransportError::Closed)?;
        let frame = Payload::Message(message.clone()).into_frame()?;
        write_frame(writer, &frame).await?;
        Ok(())
    }

    /// Finish the stream. The server then ends the session and announces the
    /// departure. Idempotent.
    ///
    /// # Errors
    ///
    /// - `TransportError::Stream` if the shutdown itself fails
    pub async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(mut writer) = self.writer.take() {
            writer.shutdown().await.map_err(|e| TransportError::Stream(e.to_string()))?;
        }
        Ok(())
    }

    /// Whether [`Self::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }
}

/// Read half of an upstream session.
pub struct UpstreamReceiver {
    reader: BoxedReader,
}

impl UpstreamReceiver {
    /// Next message from the server. `Ok(None)` once the server finishes the
    /// stream.
    ///
    /// # Errors
    ///
    /// - `TransportError::HandshakeRejected` if the server sent an error frame
    /// - `TransportError::Protocol` on malformed frames or read failure
    pub async fn recv(&mut self) -> Result<Option<ChatMessage>, TransportError> {
        let Some(frame) = read_frame(&mut self.reader).await? else {
            return Ok(None);
        };

        match Payload::from_frame(&frame)? {
            Payload::Message(message) => Ok(Some(message)),
            Payload::Error(error) => Err(TransportError::HandshakeRejected(error.message)),
        }
    }
}
