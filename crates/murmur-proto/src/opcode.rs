//! Frame opcodes.

/// Identifies the payload type carried by a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// CBOR-encoded [`crate::ChatMessage`]
    Message = 0x01,
    /// CBOR-encoded [`crate::ErrorPayload`]
    Error = 0x02,
}

impl Opcode {
    /// Wire representation.
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parse a wire byte. `None` for unknown opcodes.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Message),
            0x02 => Some(Self::Error),
            _ => None,
        }
    }
}
