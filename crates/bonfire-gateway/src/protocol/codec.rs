//! Envelope codec
//!
//! Inbound: binary frames are protobuf, text frames are JSON, whatever the
//! connection negotiated. Outbound: the negotiated [`Encoding`] decides.

use prost::encoding::decode_varint;
use prost::Message;

use super::messages::{Envelope, Payload, PAYLOAD_TAGS, SEQ_TAG};
use super::{Encoding, ProtocolError};

const WIRE_VARINT: u8 = 0;
const WIRE_FIXED64: u8 = 1;
const WIRE_LEN: u8 = 2;
const WIRE_FIXED32: u8 = 5;

/// A data frame, independent of the WebSocket library
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    Text(String),
    Binary(Vec<u8>),
}

impl WireFrame {
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Encoding implied by the frame type
    pub const fn encoding(&self) -> Encoding {
        match self {
            Self::Text(_) => Encoding::Json,
            Self::Binary(_) => Encoding::Protobuf,
        }
    }
}

/// Decode an inbound frame into exactly one payload
///
/// Any seq the client sets is ignored.
pub fn decode(frame: &WireFrame, max_bytes: usize) -> Result<Payload, ProtocolError> {
    if frame.len() > max_bytes {
        return Err(ProtocolError::FrameTooLarge {
            size: frame.len(),
            limit: max_bytes,
        });
    }

    let envelope = match frame {
        WireFrame::Text(text) => serde_json::from_str::<Envelope>(text)?,
        WireFrame::Binary(bytes) => {
            scan_variants(bytes)?;
            Envelope::decode(bytes.as_slice())?
        }
    };

    envelope.payload.ok_or(ProtocolError::EmptyEnvelope)
}

/// Encode an outbound envelope in the session's encoding
pub fn encode(envelope: &Envelope, encoding: Encoding) -> Result<WireFrame, ProtocolError> {
    match encoding {
        Encoding::Protobuf => Ok(WireFrame::Binary(envelope.encode_to_vec())),
        Encoding::Json => serde_json::to_string(envelope)
            .map(WireFrame::Text)
            .map_err(|e| ProtocolError::Encode(e.to_string())),
    }
}

/// Walk the top-level fields of a protobuf envelope and count oneof members
///
/// prost silently keeps the last oneof member it sees and skips unknown tags;
/// the gateway treats both as violations.
fn scan_variants(mut buf: &[u8]) -> Result<(), ProtocolError> {
    let mut variants = 0usize;

    while !buf.is_empty() {
        let key = decode_varint(&mut buf)?;
        let tag = u32::try_from(key >> 3).map_err(|_| ProtocolError::UnknownVariant(u32::MAX))?;
        #[allow(clippy::cast_possible_truncation)]
        let wire_type = (key & 0x7) as u8;

        let expected = if tag == SEQ_TAG {
            WIRE_VARINT
        } else if PAYLOAD_TAGS.contains(&tag) {
            variants += 1;
            WIRE_LEN
        } else {
            return Err(ProtocolError::UnknownVariant(tag));
        };

        if wire_type != expected {
            return Err(ProtocolError::InvalidWireType { tag, wire_type });
        }

        buf = skip_field(buf, tag, wire_type)?;
    }

    match variants {
        0 => Err(ProtocolError::EmptyEnvelope),
        1 => Ok(()),
        n => Err(ProtocolError::MultipleVariants(n)),
    }
}

fn skip_field(mut buf: &[u8], tag: u32, wire_type: u8) -> Result<&[u8], ProtocolError> {
    let len = match wire_type {
        WIRE_VARINT => {
            decode_varint(&mut buf)?;
            return Ok(buf);
        }
        WIRE_FIXED64 => 8,
        WIRE_FIXED32 => 4,
        WIRE_LEN => {
            usize::try_from(decode_varint(&mut buf)?).map_err(|_| ProtocolError::Truncated(tag))?
        }
        _ => return Err(ProtocolError::InvalidWireType { tag, wire_type }),
    };

    buf.get(len..).ok_or(ProtocolError::Truncated(tag))
}
