//! Wire encodings

use std::fmt;

use super::ProtocolError;

/// Frame encoding
///
/// Inbound frames pick their encoding from the frame type (binary or text).
/// The connection's `encoding` query parameter fixes the outbound encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    /// Binary frames carrying a protobuf `Envelope`
    #[default]
    Protobuf,
    /// Text frames carrying a JSON envelope
    Json,
}

impl Encoding {
    /// Resolve the `encoding` query parameter; absent or empty means protobuf
    pub fn from_query(value: Option<&str>) -> Result<Self, ProtocolError> {
        match value.map(str::trim) {
            None | Some("") => Ok(Self::default()),
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "protobuf" | "proto" => Ok(Self::Protobuf),
                "json" => Ok(Self::Json),
                _ => Err(ProtocolError::UnknownEncoding(raw.to_string())),
            },
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Protobuf => "protobuf",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
