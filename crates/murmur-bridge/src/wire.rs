//! JSON messages exchanged with browser clients.
//!
//! One flat object shape serves every direction; `type` selects which fields
//! matter. Upstream [`ChatMessage`]s are translated with
//! [`WireMessage::from`].

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use murmur_proto::ChatMessage;
use serde::{Deserialize, Serialize};

use crate::BridgeError;

/// Discriminant carried in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WireKind {
    /// Client asks to join under `user`
    Join,
    /// Chat message, broadcast or direct
    Chat,
    /// Notice authored by the server
    System,
    /// Online users, sent to a client right after it joins
    UserList,
    /// Another bridge client joined
    UserJoin,
    /// Another bridge client left
    UserLeave,
    /// Failure reported to this client only
    Error,
    /// Any type this bridge does not know
    #[serde(other)]
    Unknown,
}

/// A bridge wire message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    /// Message kind
    #[serde(rename = "type")]
    pub kind: WireKind,
    /// Author, joining user, or subject of a presence notice
    #[serde(default)]
    pub user: String,
    /// Message text
    #[serde(default)]
    pub text: String,
    /// Direct-message target; empty for broadcasts
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub recipient_user: String,
    /// RFC 3339 time
    #[serde(default)]
    pub timestamp: String,
    /// Online usernames, `userList` only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<String>>,
}

impl WireMessage {
    fn new(kind: WireKind) -> Self {
        Self {
            kind,
            user: String::new(),
            text: String::new(),
            recipient_user: String::new(),
            timestamp: now_rfc3339(),
            users: None,
        }
    }

    /// `join` request for `user`.
    pub fn join(user: impl Into<String>) -> Self {
        Self { user: user.into(), ..Self::new(WireKind::Join) }
    }

    /// Broadcast `chat` from `user`.
    pub fn chat(user: impl Into<String>, text: impl Into<String>) -> Self {
        Self { user: user.into(), text: text.into(), ..Self::new(WireKind::Chat) }
    }

    /// Address this message to `recipient`.
    #[must_use]
    pub fn to(mut self, recipient: impl Into<String>) -> Self {
        self.recipient_user = recipient.into();
        self
    }

    /// `error` for the receiving client.
    pub fn error(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Self::new(WireKind::Error) }
    }

    /// `userList` with the given online users.
    pub fn user_list(users: Vec<String>) -> Self {
        Self { users: Some(users), ..Self::new(WireKind::UserList) }
    }

    /// `userJoin` announcing `user`.
    pub fn user_join(user: impl Into<String>) -> Self {
        Self { user: user.into(), ..Self::new(WireKind::UserJoin) }
    }

    /// Parse one inbound frame.
    ///
    /// # Errors
    ///
    /// - `BridgeError::Serialization` if the bytes are not a wire message
    pub fn parse(bytes: &[u8]) -> Result<Self, BridgeError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Serialize for the outbound queue.
    ///
    /// # Errors
    ///
    /// - `BridgeError::Serialization` if encoding fails
    pub fn to_json(&self) -> Result<Arc<str>, BridgeError> {
        Ok(serde_json::to_string(self)?.into())
    }
}

impl From<&ChatMessage> for WireMessage {
    fn from(message: &ChatMessage) -> Self {
        let kind = if message.is_system() { WireKind::System } else { WireKind::Chat };
        Self {
            kind,
            user: message.sender_username.clone(),
            text: message.body.clone(),
            recipient_user: message.recipient_username.clone(),
            timestamp: rfc3339_from_millis(message.timestamp),
            users: None,
        }
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Upstream millis as RFC 3339; unset (0) or out of range falls back to now.
fn rfc3339_from_millis(millis: u64) -> String {
    i64::try_from(millis)
        .ok()
        .filter(|&m| m > 0)
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map_or_else(now_rfc3339, |t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    const NOW: u64 = 1_700_000_000_000;

    fn as_value(message: &WireMessage) -> Value {
        serde_json::from_str(&message.to_json().unwrap()).unwrap()
    }

    #[test]
    fn upstream_chat_translates_to_chat() {
        let wire = WireMessage::from(&ChatMessage::new("alice", "hi").at(NOW));
        assert_eq!(
            as_value(&wire),
            json!({
                "type": "chat",
                "user": "alice",
                "text": "hi",
                "timestamp": "2023-11-14T22:13:20Z",
            })
        );
    }

    #[test]
    fn upstream_direct_keeps_recipient() {
        let wire = WireMessage::from(&ChatMessage::new("alice", "psst").to("bob").at(NOW));
        assert_eq!(as_value(&wire)["recipientUser"], "bob");
    }

    #[test]
    fn system_sender_translates_to_system() {
        let notice = murmur_core::notice::left("alice", NOW);
        let wire = WireMessage::from(&notice);
        assert_eq!(wire.kind, WireKind::System);
        assert_eq!(wire.user, "System");
        assert_eq!(wire.text, "alice has left the chat");
    }

    #[test]
    fn unstamped_upstream_gets_current_time() {
        let wire = WireMessage::from(&ChatMessage::new("alice", "hi"));
        let parsed = DateTime::parse_from_rfc3339(&wire.timestamp).unwrap();
        assert!(parsed.timestamp() > 1_700_000_000);
    }

    #[test]
    fn user_list_shape() {
        let value = as_value(&WireMessage::user_list(vec!["alice".into(), "bob".into()]));
        assert_eq!(value["type"], "userList");
        assert_eq!(value["users"], json!(["alice", "bob"]));
        assert!(value.get("recipientUser").is_none());
    }

    #[test]
    fn users_omitted_outside_user_list() {
        let value = as_value(&WireMessage::user_join("carol"));
        assert_eq!(value["type"], "userJoin");
        assert_eq!(value["user"], "carol");
        assert!(value.get("users").is_none());
    }

    #[test]
    fn parse_minimal_client_messages() {
        let join = WireMessage::parse(br#"{"type":"join","user":"alice"}"#).unwrap();
        assert_eq!(join.kind, WireKind::Join);
        assert_eq!(join.user, "alice");

        let chat =
            WireMessage::parse(br#"{"type":"chat","text":"hi","recipientUser":"bob"}"#).unwrap();
        assert_eq!(chat.kind, WireKind::Chat);
        assert_eq!(chat.recipient_user, "bob");
        assert!(chat.user.is_empty());
    }

    #[test]
    fn unknown_type_parses_as_unknown() {
        let msg = WireMessage::parse(br#"{"type":"typing","user":"alice"}"#).unwrap();
        assert_eq!(msg.kind, WireKind::Unknown);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(WireMessage::parse(b"{not json"), Err(BridgeError::Serialization(_))));
        assert!(matches!(WireMessage::parse(br#"{"user":"x"}"#), Err(BridgeError::Serialization(_))));
    }
}
