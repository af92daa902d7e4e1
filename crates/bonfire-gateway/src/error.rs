//! Gateway error types

use thiserror::Error;

use crate::connection::{ConnectionId, SessionId};
use crate::protocol::{CloseCode, ProtocolError};

/// Errors raised while driving a connection or mutating the session registry
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed frame, bad negotiation, or oversized frame
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A payload arrived in a state that does not accept it
    #[error("Unexpected `{payload}` while {state}")]
    UnexpectedPayload {
        state: &'static str,
        payload: &'static str,
    },

    /// A well-typed payload with unusable contents
    #[error("Malformed `{payload}`: {reason}")]
    MalformedPayload {
        payload: &'static str,
        reason: &'static str,
    },

    /// The client sent a server-only payload
    #[error("`{0}` may only be sent by the server")]
    WrongDirection(&'static str),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("No Identify received in time")]
    IdentifyTimeout,

    #[error("Connection idle for too long")]
    IdleTimeout,

    #[error("Connection {0} already owns a session")]
    DuplicateConnection(ConnectionId),

    #[error("Session {0} not found")]
    SessionNotFound(SessionId),

    /// The server drove the bootstrap machine out of order
    #[error("Invalid transition: {input} while {state}")]
    InvalidTransition {
        state: &'static str,
        input: &'static str,
    },

    /// The connection already reached `Closed`
    #[error("Connection closed")]
    Closed,

    #[error("Transport error: {0}")]
    Transport(String),
}

impl GatewayError {
    /// Convert to a close code (if the peer should receive one)
    pub fn to_close_code(&self) -> Option<CloseCode> {
        match self {
            Self::Protocol(e) => Some(e.to_close_code()),
            Self::UnexpectedPayload { .. }
            | Self::MalformedPayload { .. }
            | Self::WrongDirection(_) => Some(CloseCode::ProtocolViolation),
            Self::AuthFailed(_) => Some(CloseCode::AuthFailure),
            Self::IdentifyTimeout | Self::IdleTimeout => Some(CloseCode::Timeout),
            Self::DuplicateConnection(_)
            | Self::SessionNotFound(_)
            | Self::InvalidTransition { .. } => Some(CloseCode::UnknownError),
            Self::Closed | Self::Transport(_) => None,
        }
    }
}

/// Gateway result type
pub type GatewayResult<T> = Result<T, GatewayError>;
