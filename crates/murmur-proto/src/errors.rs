//! Protocol error types.

use std::io;

use thiserror::Error;

/// Errors produced while encoding, decoding or transporting frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer shorter than a frame header
    #[error("frame too short: expected {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Bytes required
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// Header magic does not match [`crate::FrameHeader::MAGIC`]
    #[error("invalid magic number")]
    InvalidMagic,

    /// Header version is not [`crate::FrameHeader::VERSION`]
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Payload exceeds [`crate::FrameHeader::MAX_PAYLOAD_SIZE`]
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Claimed or actual payload size
        size: usize,
        /// Maximum allowed size
        max: usize,
    },

    /// Stream ended in the middle of a frame
    #[error("frame truncated: expected {expected} bytes, got {actual}")]
    FrameTruncated {
        /// Bytes the header promised
        expected: usize,
        /// Bytes actually received
        actual: usize,
    },

    /// Opcode byte does not name a known payload
    #[error("unknown opcode: {0:#04x}")]
    UnknownOpcode(u8),

    /// CBOR serialization failed
    #[error("CBOR encode error: {0}")]
    CborEncode(String),

    /// CBOR deserialization failed
    #[error("CBOR decode error: {0}")]
    CborDecode(String),

    /// Underlying stream I/O failed
    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

impl From<io::Error> for ProtocolError {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
