//! System notices broadcast by the server.
//!
//! All notices carry [`murmur_proto::SYSTEM_SENDER`] as sender and are always
//! stamped with the server clock.

use murmur_proto::ChatMessage;

/// "{user} has joined the chat"
pub fn joined(username: &str, now_millis: u64) -> ChatMessage {
    ChatMessage::system(format!("{username} has joined the chat")).at(now_millis)
}

/// "{user} has left the chat"
pub fn left(username: &str, now_millis: u64) -> ChatMessage {
    ChatMessage::system(format!("{username} has left the chat")).at(now_millis)
}

/// Sent only to the author of a direct message nobody received.
pub fn recipient_not_found(recipient: &str, now_millis: u64) -> ChatMessage {
    ChatMessage::system(format!("User '{recipient}' not found or is offline.")).at(now_millis)
}
