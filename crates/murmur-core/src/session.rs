//! Stream session state machine.
//!
//! One `Session` exists per duplex stream on the broadcast server. It decides
//! what happens to each inbound message; the server executes the decision.
//!
//! # State Machine
//!
//! ```text
//! ┌───────────────────┐  handshake ok  ┌────────┐  end of stream  ┌────────┐
//! │ AwaitingHandshake │───────────────>│ Active │────────────────>│ Closed │
//! └───────────────────┘                └────────┘                 └────────┘
//!           │                                                          ↑
//!           │ empty username                                           │
//!           └──────────────────────────────────────────────────────────┘
//! ```

use murmur_proto::{ChatMessage, SYSTEM_SENDER};

use crate::{ConnectionId, ConnectionIds, error::SessionError, notice};

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the first message carrying a username
    AwaitingHandshake,
    /// Handshake accepted; messages are routed
    Active,
    /// Stream finished or handshake rejected
    Closed,
}

/// Routing decision for one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Deliver to every connection except `exclude`
    Broadcast {
        /// Message to deliver
        message: ChatMessage,
        /// The author's own connection
        exclude: ConnectionId,
    },
    /// Deliver to every connection owned by `recipient`, then echo to the
    /// author
    Direct {
        /// Target username
        recipient: String,
        /// Message to deliver
        message: ChatMessage,
    },
}

/// Per-stream session state machine.
///
/// Pure: takes the current time as an argument and never performs I/O.
#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    identity: Option<(ConnectionId, String)>,
}

impl Session {
    /// Create a session in [`SessionState::AwaitingHandshake`].
    #[must_use]
    pub fn new() -> Self {
        Self { state: SessionState::AwaitingHandshake, identity: None }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Connection id assigned at handshake. `None` before then.
    #[must_use]
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.identity.as_ref().map(|(id, _)| *id)
    }

    /// Username from the handshake. `None` before then.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.identity.as_ref().map(|(_, name)| name.as_str())
    }

    /// Process the first message on the stream.
    ///
    /// On success allocates a connection id from `ids`, transitions to
    /// [`SessionState::Active`] and returns the join notice to broadcast
    /// (excluding the new connection). The handshake message itself is not
    /// routed.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` if not awaiting a handshake
    /// - `SessionError::InvalidHandshake` if `sender_username` is empty or
    ///   the reserved system sender; the session moves to
    ///   [`SessionState::Closed`]
    pub fn handle_handshake(
        &mut self,
        first: &ChatMessage,
        ids: &ConnectionIds,
        now_millis: u64,
    ) -> Result<ChatMessage, SessionError> {
        if self.state != SessionState::AwaitingHandshake {
            return Err(SessionError::InvalidState {
                state: self.state,
                operation: "handle_handshake",
            });
        }

        let reason = if first.sender_username.is_empty() {
            Some("username cannot be empty")
        } else if first.sender_username == SYSTEM_SENDER {
            Some("username is reserved")
        } else {
            None
        };
        if let Some(reason) = reason {
            self.state = SessionState::Closed;
            return Err(SessionError::InvalidHandshake { reason: reason.to_string() });
        }

        let id = ids.next_id();
        let username = first.sender_username.clone();
        let notice = notice::joined(&username, now_millis);

        self.identity = Some((id, username));
        self.state = SessionState::Active;

        Ok(notice)
    }

    /// Decide where an inbound message goes.
    ///
    /// The author is always the session's own username; whatever the peer put
    /// in `sender_username` is replaced. A zero timestamp is stamped with
    /// `now_millis`.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` if not [`SessionState::Active`]
    pub fn route(&self, mut message: ChatMessage, now_millis: u64) -> Result<Route, SessionError> {
        let (SessionState::Active, Some((id, username))) = (self.state, self.identity.as_ref())
        else {
            return Err(SessionError::InvalidState { state: self.state, operation: "route" });
        };

        message.sender_username.clone_from(username);
        if message.timestamp == 0 {
            message.timestamp = now_millis;
        }

        if message.is_direct() {
            Ok(Route::Direct { recipient: message.recipient_username.clone(), message })
        } else {
            Ok(Route::Broadcast { message, exclude: *id })
        }
    }

    /// Close the session.
    ///
    /// Returns the leave notice to broadcast when the session had been
    /// active. Idempotent: later calls return `None`.
    pub fn close(&mut self, now_millis: u64) -> Option<ChatMessage> {
        let was_active = self.state == SessionState::Active;
        self.state = SessionState::Closed;

        if was_active { self.username().map(|name| notice::left(name, now_millis)) } else { None }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
