//! Murmur upstream protocol.
//!
//! Every session between a client and the broadcast server is one duplex byte
//! stream carrying a sequence of length-delimited frames. A frame is a fixed
//! 12-byte binary header followed by a CBOR payload.
//!
//! # Components
//!
//! - [`FrameHeader`]: fixed binary header (magic, version, opcode, size)
//! - [`Frame`]: header plus raw payload bytes
//! - [`Payload`]: typed view of a frame ([`ChatMessage`] or [`ErrorPayload`])
//! - [`read_frame`] / [`write_frame`]: async framing over any
//!   `AsyncRead`/`AsyncWrite`
//!
//! The first frame a client sends on a new stream is the handshake: a
//! [`ChatMessage`] whose `sender_username` is non-empty.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
mod frame;
mod header;
mod io;
mod message;
mod opcode;
mod payload;

pub use errors::{ProtocolError, Result};
pub use frame::Frame;
pub use header::FrameHeader;
pub use io::{read_frame, write_frame};
pub use message::{ChatMessage, ErrorPayload, SYSTEM_SENDER};
pub use opcode::Opcode;
pub use payload::Payload;

/// ALPN protocol identifier negotiated on QUIC connections.
pub const ALPN_PROTOCOL: &[u8] = b"murmur";
