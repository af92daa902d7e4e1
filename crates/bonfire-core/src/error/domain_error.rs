//! Domain errors - failures reported by domain collaborators
//!
//! These never close a connection; the gateway turns them into an error
//! envelope for the session that issued the command.

use thiserror::Error;

use crate::value_objects::{Scope, Snowflake};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    // =========================================================================
    // Not Found Errors
    // =========================================================================
    #[error("Channel not found: {0}")]
    ChannelNotFound(Snowflake),

    #[error("Message not found: {0}")]
    MessageNotFound(Snowflake),

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    #[error("Content too long: max {max} characters")]
    ContentTooLong { max: usize },

    // =========================================================================
    // Authorization Errors
    // =========================================================================
    #[error("Not allowed to subscribe to {0}")]
    SubscriptionDenied(Scope),

    #[error("Cannot send messages in this channel")]
    CannotSendMessages,

    // =========================================================================
    // Infrastructure Errors (wrapped)
    // =========================================================================
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DomainError {
    /// Stable error code carried in error envelopes
    pub fn code(&self) -> &'static str {
        match self {
            Self::ChannelNotFound(_) => "UNKNOWN_CHANNEL",
            Self::MessageNotFound(_) => "UNKNOWN_MESSAGE",

            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::InvalidScope(_) => "INVALID_SCOPE",
            Self::ContentTooLong { .. } => "CONTENT_TOO_LONG",

            Self::SubscriptionDenied(_) => "SUBSCRIPTION_DENIED",
            Self::CannotSendMessages => "CANNOT_SEND_MESSAGES",

            Self::Unavailable(_) => "UNAVAILABLE",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ChannelNotFound(_) | Self::MessageNotFound(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::ValidationError(_) | Self::InvalidScope(_) | Self::ContentTooLong { .. }
        )
    }

    pub fn is_authorization(&self) -> bool {
        matches!(self, Self::SubscriptionDenied(_) | Self::CannotSendMessages)
    }
}
