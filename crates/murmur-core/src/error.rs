//! Session error types.

use thiserror::Error;

use crate::session::SessionState;

/// Errors raised by the [`crate::Session`] state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// First message on the stream did not carry a username
    #[error("invalid handshake: {reason}")]
    InvalidHandshake {
        /// Why the handshake was rejected
        reason: String,
    },

    /// Operation not valid in the current state
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when the error occurred
        state: SessionState,
        /// Operation that was attempted
        operation: &'static str,
    },
}
