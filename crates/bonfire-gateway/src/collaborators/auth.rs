//! Identity verification seam
//!
//! The gateway never interprets identity material itself; it forwards the
//! Identify payload to an [`Authenticator`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bonfire_common::{strip_bearer, AppError, JwtService};
use bonfire_core::Snowflake;
use thiserror::Error;

use crate::protocol::payloads::IdentifyMessage;

/// Result of a successful Identify
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Snowflake,
    /// Client name/version from the Identify payload, empty if not sent
    pub client_agent: String,
}

/// Why identity material was rejected
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing identity token")]
    MissingToken,

    #[error("Invalid identity token")]
    InvalidToken,

    #[error("Identity token expired")]
    Expired,

    #[error("Authentication backend unavailable: {0}")]
    Unavailable(String),
}

impl From<AppError> for AuthError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::MissingAuth => Self::MissingToken,
            AppError::TokenExpired => Self::Expired,
            AppError::InvalidToken => Self::InvalidToken,
            other => Self::Unavailable(other.to_string()),
        }
    }
}

/// Verifies the identity material carried by Identify
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, identify: &IdentifyMessage) -> Result<Identity, AuthError>;
}

/// Accepts bearer JWTs issued by [`JwtService`]
#[derive(Debug, Clone)]
pub struct JwtAuthenticator {
    jwt: Arc<JwtService>,
}

impl JwtAuthenticator {
    pub fn new(jwt: Arc<JwtService>) -> Self {
        Self { jwt }
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    async fn authenticate(&self, identify: &IdentifyMessage) -> Result<Identity, AuthError> {
        let claims = self.jwt.validate(strip_bearer(&identify.token))?;
        let user_id = claims.user_id()?;

        Ok(Identity {
            user_id,
            client_agent: identify.client_agent.clone(),
        })
    }
}

/// Fixed token table, for tests and local tooling
#[derive(Debug, Clone, Default)]
pub struct StaticAuthenticator {
    tokens: HashMap<String, Snowflake>,
}

impl StaticAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, user_id: Snowflake) -> Self {
        self.tokens.insert(token.into(), user_id);
        self
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, identify: &IdentifyMessage) -> Result<Identity, AuthError> {
        let token = strip_bearer(&identify.token);
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let user_id = self
            .tokens
            .get(token)
            .copied()
            .ok_or(AuthError::InvalidToken)?;

        Ok(Identity {
            user_id,
            client_agent: identify.client_agent.clone(),
        })
    }
}
