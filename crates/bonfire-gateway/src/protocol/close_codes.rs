//! WebSocket close codes
//!
//! Terminal signals sent in the close frame when the gateway ends a connection.

use serde::{Deserialize, Serialize};

/// Gateway WebSocket close codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum CloseCode {
    /// Unexpected server-side failure
    UnknownError = 4000,
    /// Malformed envelope, wrong variant for the current state, or oversized frame
    ProtocolViolation = 4002,
    /// Identity rejected by the auth collaborator
    AuthFailure = 4004,
    /// No Identify within the bound, or the client went silent
    Timeout = 4009,
    /// Requested protocol version is not supported
    VersionUnsupported = 4012,
    /// The session could not keep up with its outbound stream
    BackpressureOverflow = 4013,
}

impl CloseCode {
    /// Create a `CloseCode` from a raw u16 value
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            4000 => Some(Self::UnknownError),
            4002 => Some(Self::ProtocolViolation),
            4004 => Some(Self::AuthFailure),
            4009 => Some(Self::Timeout),
            4012 => Some(Self::VersionUnsupported),
            4013 => Some(Self::BackpressureOverflow),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Check if the client should attempt to reconnect after this close code
    ///
    /// Reconnecting with the same version or credentials cannot succeed after
    /// a version or auth rejection.
    #[must_use]
    pub const fn should_reconnect(self) -> bool {
        matches!(
            self,
            Self::UnknownError | Self::Timeout | Self::BackpressureOverflow
        )
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::UnknownError => "Unknown error occurred",
            Self::ProtocolViolation => "Protocol violation",
            Self::AuthFailure => "Authentication failed",
            Self::Timeout => "Timed out",
            Self::VersionUnsupported => "Unsupported protocol version",
            Self::BackpressureOverflow => "Outbound backpressure overflow",
        }
    }

    /// Machine-readable name, also used as the close frame reason
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::UnknownError => "UNKNOWN_ERROR",
            Self::ProtocolViolation => "PROTOCOL_VIOLATION",
            Self::AuthFailure => "AUTH_FAILURE",
            Self::Timeout => "TIMEOUT",
            Self::VersionUnsupported => "VERSION_UNSUPPORTED",
            Self::BackpressureOverflow => "BACKPRESSURE_OVERFLOW",
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.as_u16(), self.description())
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}
