//! Application error types
//!
//! Errors shared by the gateway's infrastructure: token validation,
//! configuration, and internal failures.

use bonfire_core::DomainError;
use serde::Serialize;
use std::fmt;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Missing authentication")]
    MissingAuth,

    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    // Internal errors
    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// HTTP status code used by the health/diagnostic endpoints
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::InvalidToken | Self::TokenExpired | Self::MissingAuth => 401,
            Self::Internal(_) | Self::Config(_) => 500,
            Self::Domain(e) => {
                if e.is_not_found() {
                    404
                } else if e.is_authorization() {
                    403
                } else if e.is_validation() {
                    400
                } else {
                    500
                }
            }
        }
    }

    /// Stable machine-readable code
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::MissingAuth => "MISSING_AUTH",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Domain(e) => e.code(),
        }
    }

    /// Whether the error stems from credentials the client presented
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::InvalidToken | Self::TokenExpired | Self::MissingAuth)
    }

    #[must_use]
    pub fn validation(msg: impl fmt::Display) -> Self {
        Self::Validation(msg.to_string())
    }

    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

/// Error body for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.error_code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use bonfire_core::Snowflake;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::InvalidToken.status_code(), 401);
        assert_eq!(AppError::validation("bad").status_code(), 400);
        assert_eq!(AppError::Config("x".to_string()).status_code(), 500);
        assert_eq!(
            AppError::Domain(DomainError::ChannelNotFound(Snowflake::new(1))).status_code(),
            404
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::TokenExpired.error_code(), "TOKEN_EXPIRED");
        assert_eq!(
            AppError::Domain(DomainError::CannotSendMessages).error_code(),
            "CANNOT_SEND_MESSAGES"
        );
    }

    #[test]
    fn test_is_auth_error() {
        assert!(AppError::InvalidToken.is_auth_error());
        assert!(AppError::MissingAuth.is_auth_error());
        assert!(!AppError::internal(anyhow::anyhow!("boom")).is_auth_error());
    }

    #[test]
    fn test_error_response() {
        let err = AppError::validation("scope is required");
        let response = ErrorResponse::from(&err);

        assert_eq!(response.code, "VALIDATION_ERROR");
        assert_eq!(response.message, "Validation error: scope is required");
    }
}
