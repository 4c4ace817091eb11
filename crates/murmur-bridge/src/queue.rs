//! Bounded per-client outbound queue.
//!
//! Producers never wait: [`OutboundQueue::enqueue`] either buffers the
//! message or, when the buffer is full, closes the queue. The first producer
//! to hit a full queue gets [`BridgeError::QueueOverflow`] and is responsible
//! for evicting the client; everyone after that sees
//! [`BridgeError::QueueClosed`].

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

use crate::BridgeError;

/// Serialized wire message, shared between every queue it is broadcast to.
pub type Outbound = Arc<str>;

/// Create a queue holding at most `capacity` messages.
pub fn outbound_queue(capacity: usize) -> (OutboundQueue, OutboundReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let queue = OutboundQueue {
        tx,
        closed: Arc::new(AtomicBool::new(false)),
        cancel: CancellationToken::new(),
    };
    (queue, OutboundReceiver { rx })
}

/// Producer half. Cheap to clone; every clone shares one closed flag.
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    tx: mpsc::Sender<Outbound>,
    closed: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl OutboundQueue {
    /// Buffer `message` without waiting.
    ///
    /// # Errors
    ///
    /// - `BridgeError::QueueOverflow` if the buffer was full; the queue is now
    ///   closed and this caller must evict the client
    /// - `BridgeError::QueueClosed` if the queue was already closed
    pub fn enqueue(&self, message: Outbound) -> Result<(), BridgeError> {
        if self.is_closed() {
            return Err(BridgeError::QueueClosed);
        }

        match self.tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                if self.close() {
                    Err(BridgeError::QueueOverflow)
                } else {
                    Err(BridgeError::QueueClosed)
                }
            },
            Err(TrySendError::Closed(_)) => {
                self.close();
                Err(BridgeError::QueueClosed)
            },
        }
    }

    /// Close the queue. Returns `true` only for the call that closed it.
    pub fn close(&self) -> bool {
        let first = !self.closed.swap(true, Ordering::AcqRel);
        self.cancel.cancel();
        first
    }

    /// Whether the queue has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolves once the queue is closed.
    pub async fn closed(&self) {
        self.cancel.cancelled().await;
    }
}

/// Consumer half, owned by the client's write pump.
#[derive(Debug)]
pub struct OutboundReceiver {
    rx: mpsc::Receiver<Outbound>,
}

impl OutboundReceiver {
    /// Next buffered message, `None` once every producer is gone.
    pub async fn recv(&mut self) -> Option<Outbound> {
        self.rx.recv().await
    }

    /// Buffered message, if one is ready right now.
    pub fn try_recv(&mut self) -> Option<Outbound> {
        self.rx.try_recv().ok()
    }
}
