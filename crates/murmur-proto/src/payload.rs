//! Typed frame payloads.
//!
//! The header opcode identifies the payload type, so only the inner struct is
//! CBOR-encoded. No variant tag travels on the wire.

use bytes::BufMut;

use crate::{
    ChatMessage, ErrorPayload, Frame, FrameHeader, Opcode,
    errors::{ProtocolError, Result},
};

/// All possible frame payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Chat message in either direction
    Message(ChatMessage),
    /// Server-side rejection, sent before the server finishes the stream
    Error(ErrorPayload),
}

impl Payload {
    /// Opcode for this payload type.
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::Message(_) => Opcode::Message,
            Self::Error(_) => Opcode::Error,
        }
    }

    /// CBOR-encode the inner struct into `dst`.
    ///
    /// Size limits are enforced later by [`Frame::encode`].
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborEncode` if serialization fails
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        let mut writer = dst.writer();

        match self {
            Self::Message(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::Error(inner) => ciborium::ser::into_writer(inner, &mut writer),
        }
        .map_err(|e| ProtocolError::CborEncode(e.to_string()))
    }

    /// Decode a payload of the given opcode.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PayloadTooLarge` if `bytes` exceeds the frame limit
    /// - `ProtocolError::CborDecode` if the bytes are not a valid payload
    pub fn decode(opcode: Opcode, bytes: &[u8]) -> Result<Self> {
        if bytes.len() > FrameHeader::MAX_PAYLOAD_SIZE as usize {
            return Err(ProtocolError::PayloadTooLarge {
                size: bytes.len(),
                max: FrameHeader::MAX_PAYLOAD_SIZE as usize,
            });
        }

        let payload = match opcode {
            Opcode::Message => Self::Message(
                ciborium::de::from_reader(bytes)
                    .map_err(|e| ProtocolError::CborDecode(e.to_string()))?,
            ),
            Opcode::Error => Self::Error(
                ciborium::de::from_reader(bytes)
                    .map_err(|e| ProtocolError::CborDecode(e.to_string()))?,
            ),
        };

        Ok(payload)
    }

    /// Encode into a complete frame with the matching opcode.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborEncode` if serialization fails
    pub fn into_frame(self) -> Result<Frame> {
        let mut buf = Vec::new();
        self.encode(&mut buf)?;
        Ok(Frame::new(FrameHeader::new(self.opcode()), buf))
    }

    /// Parse the typed payload out of a frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnknownOpcode` if the header opcode is not known
    /// - `ProtocolError::CborDecode` if the payload does not match the opcode
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let opcode = frame
            .header
            .opcode_enum()
            .ok_or(ProtocolError::UnknownOpcode(frame.header.opcode()))?;

        Self::decode(opcode, &frame.payload)
    }
}

impl From<ChatMessage> for Payload {
    fn from(message: ChatMessage) -> Self {
        Self::Message(message)
    }
}

impl From<ErrorPayload> for Payload {
    fn from(error: ErrorPayload) -> Self {
        Self::Error(error)
    }
}
