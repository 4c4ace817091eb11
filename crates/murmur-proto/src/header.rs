//! Frame header with zero-copy parsing.
//!
//! The header is a fixed 12-byte big-endian structure. Readers pull exactly
//! [`FrameHeader::SIZE`] bytes off the stream, validate them, and then know
//! how many payload bytes follow.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{
    Opcode,
    errors::{ProtocolError, Result},
};

/// Fixed 12-byte frame header (big endian).
///
/// Fields are raw byte arrays so every bit pattern is a valid value and the
/// struct can be cast directly from untrusted network bytes.
///
/// ```text
/// 0      4        5        6          8              12
/// +------+--------+--------+----------+---------------+
/// | MRMR | version| opcode | reserved | payload_size  |
/// +------+--------+--------+----------+---------------+
/// ```
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FrameHeader {
    magic: [u8; 4],
    version: u8,
    pub(crate) opcode: u8,
    reserved: [u8; 2],
    pub(crate) payload_size: [u8; 4],
}

impl FrameHeader {
    /// Size of the serialized header.
    pub const SIZE: usize = 12;

    /// Magic number: "MRMR" in ASCII.
    pub const MAGIC: u32 = 0x4D52_4D52;

    /// Current protocol version.
    pub const VERSION: u8 = 0x01;

    /// Maximum payload size (64 KiB). Chat messages are small; anything
    /// larger is a broken or hostile peer.
    pub const MAX_PAYLOAD_SIZE: u32 = 64 * 1024;

    /// Create a header for `opcode` with an empty payload.
    #[must_use]
    pub fn new(opcode: Opcode) -> Self {
        Self {
            magic: Self::MAGIC.to_be_bytes(),
            version: Self::VERSION,
            opcode: opcode.to_u8(),
            reserved: [0; 2],
            payload_size: [0; 4],
        }
    }

    /// Parse and validate a header from the start of `bytes`.
    ///
    /// Trailing bytes after the header are ignored.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooShort` if fewer than [`Self::SIZE`] bytes
    /// - `ProtocolError::InvalidMagic` if the magic number is wrong
    /// - `ProtocolError::UnsupportedVersion` for any version but
    ///   [`Self::VERSION`]
    /// - `ProtocolError::PayloadTooLarge` if the claimed payload exceeds
    ///   [`Self::MAX_PAYLOAD_SIZE`]
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        let (header, _) = Self::ref_from_prefix(bytes).map_err(|_| {
            ProtocolError::FrameTooShort { expected: Self::SIZE, actual: bytes.len() }
        })?;

        if u32::from_be_bytes(header.magic) != Self::MAGIC {
            return Err(ProtocolError::InvalidMagic);
        }

        if header.version != Self::VERSION {
            return Err(ProtocolError::UnsupportedVersion(header.version));
        }

        let payload_size = header.payload_size();
        if payload_size > Self::MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_size as usize,
                max: Self::MAX_PAYLOAD_SIZE as usize,
            });
        }

        Ok(header)
    }

    /// Serialize to wire bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }

    /// Raw opcode byte.
    #[must_use]
    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    /// Opcode as enum. `None` if unknown.
    #[must_use]
    pub fn opcode_enum(&self) -> Option<Opcode> {
        Opcode::from_u8(self.opcode)
    }

    /// Number of payload bytes following the header.
    #[must_use]
    pub fn payload_size(&self) -> u32 {
        u32::from_be_bytes(self.payload_size)
    }

    /// Protocol version byte.
    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }
}

impl std::fmt::Debug for FrameHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameHeader")
            .field("version", &self.version)
            .field("opcode", &format_args!("{:#04x}", self.opcode))
            .field("payload_size", &self.payload_size())
            .finish()
    }
}
