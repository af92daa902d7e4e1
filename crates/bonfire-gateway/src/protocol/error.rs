//! Wire-level failures

use thiserror::Error;

use super::CloseCode;

/// Failure while negotiating, decoding or encoding gateway frames
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed JSON envelope: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed protobuf envelope: {0}")]
    Binary(#[from] prost::DecodeError),

    #[error("Envelope has no payload")]
    EmptyEnvelope,

    #[error("Envelope has {0} payload variants, expected exactly one")]
    MultipleVariants(usize),

    #[error("Unknown payload tag {0}")]
    UnknownVariant(u32),

    #[error("Truncated protobuf field {0}")]
    Truncated(u32),

    #[error("Invalid protobuf wire type {wire_type} for field {tag}")]
    InvalidWireType { tag: u32, wire_type: u8 },

    #[error("Frame of {size} bytes exceeds limit of {limit}")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("Unknown encoding `{0}`")]
    UnknownEncoding(String),

    #[error("Invalid protocol version `{0}`")]
    InvalidVersion(String),

    #[error("Unsupported protocol version `{0}`")]
    UnsupportedVersion(String),

    #[error("Failed to encode envelope: {0}")]
    Encode(String),
}

impl ProtocolError {
    /// Close code sent to the peer for this failure
    pub fn to_close_code(&self) -> CloseCode {
        match self {
            Self::InvalidVersion(_) | Self::UnsupportedVersion(_) => CloseCode::VersionUnsupported,
            Self::Encode(_) => CloseCode::UnknownError,
            _ => CloseCode::ProtocolViolation,
        }
    }
}
