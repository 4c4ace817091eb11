//! Outbound half of a registered connection.

use std::time::Duration;

use async_trait::async_trait;
use murmur_proto::{Frame, ProtocolError, write_frame};
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::Mutex,
};

use crate::ServerError;

/// Something the router can deliver frames to.
///
/// Implementations must be safe to call from many delivery tasks at once;
/// concurrent sends to one sink are serialized by the sink itself.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Deliver one frame.
    ///
    /// # Errors
    ///
    /// - `ServerError::SendTimeout` if the delivery did not finish in time
    /// - `ServerError::Transport` if the peer is gone
    async fn send(&self, frame: &Frame) -> Result<(), ServerError>;

    /// Finish the outbound stream. Further sends fail.
    async fn close(&self) {}
}

/// [`MessageSink`] over any async byte stream.
///
/// The lock wait and the write together are bounded by `timeout`, so one
/// stalled peer costs a delivery task at most that long.
pub struct StreamSink<W> {
    writer: Mutex<W>,
    timeout: Duration,
}

impl<W> StreamSink<W> {
    /// Wrap `writer`, bounding each send by `timeout`.
    pub fn new(writer: W, timeout: Duration) -> Self {
        Self { writer: Mutex::new(writer), timeout }
    }
}

#[async_trait]
impl<W> MessageSink for StreamSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&self, frame: &Frame) -> Result<(), ServerError> {
        let write = async {
            let mut writer = self.writer.lock().await;
            write_frame(&mut *writer, frame).await
        };

        match tokio::time::timeout(self.timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(ProtocolError::Io(reason))) => Err(ServerError::Transport(reason)),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(ServerError::SendTimeout(self.timeout)),
        }
    }

    async fn close(&self) {
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            tracing::debug!(error = %e, "outbound shutdown failed");
        }
    }
}
