//! Murmur upstream client.
//!
//! Opens a private session against the broadcast server on behalf of one
//! user: sends the handshake, then exchanges [`ChatMessage`] frames until
//! either side finishes the stream.
//!
//! # Components
//!
//! - [`UpstreamSession`]: handshake over any duplex byte stream
//! - [`UpstreamSender`] / [`UpstreamReceiver`]: independent halves, so one
//!   task can relay inbound messages while another forwards outbound ones
//! - [`UpstreamConnector`]: how a caller obtains sessions (QUIC in
//!   production, in-process pipes in tests)
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides
//! [`transport::QuicConnector`], one QUIC connection per session.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod connector;
mod error;
mod session;

#[cfg(feature = "transport")]
pub mod transport;

pub use connector::UpstreamConnector;
pub use error::TransportError;
pub use murmur_proto::ChatMessage;
pub use session::{HANDSHAKE_BODY, UpstreamReceiver, UpstreamSender, UpstreamSession};
