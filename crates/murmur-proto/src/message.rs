//! Message payloads carried inside frames.

use serde::{Deserialize, Serialize};

/// Sender name used for server-generated notices.
pub const SYSTEM_SENDER: &str = "System";

/// A chat message as it travels through the broadcast server.
///
/// Immutable value: the router clones it per recipient and never mutates a
/// message after it has been routed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Username of the author (or [`SYSTEM_SENDER`])
    pub sender_username: String,
    /// Message text
    pub body: String,
    /// Direct-message target. Empty means broadcast.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub recipient_username: String,
    /// Unix time in milliseconds. Zero means "not stamped yet".
    #[serde(default)]
    pub timestamp: u64,
}

impl ChatMessage {
    /// Broadcast message from `sender`.
    pub fn new(sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender_username: sender.into(),
            body: body.into(),
            recipient_username: String::new(),
            timestamp: 0,
        }
    }

    /// Server notice with the given text.
    pub fn system(body: impl Into<String>) -> Self {
        Self::new(SYSTEM_SENDER, body)
    }

    /// Address this message to a single username.
    #[must_use]
    pub fn to(mut self, recipient: impl Into<String>) -> Self {
        self.recipient_username = recipient.into();
        self
    }

    /// Set the timestamp (unix millis).
    #[must_use]
    pub fn at(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// True when addressed to a single username.
    #[must_use]
    pub fn is_direct(&self) -> bool {
        !self.recipient_username.is_empty()
    }

    /// True when sent by the server itself.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.sender_username == SYSTEM_SENDER
    }
}

/// Error payload sent by the server before it finishes a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Error class
    pub code: u16,
    /// Human-readable reason
    pub message: String,
}

impl ErrorPayload {
    /// The request was malformed (e.g. handshake without a username).
    pub const INVALID_ARGUMENT: u16 = 0x0001;

    /// Create an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self { code: Self::INVALID_ARGUMENT, message: message.into() }
    }
}
