//! Black-box collaborators the gateway talks to

mod auth;
mod commands;

pub use auth::{AuthError, Authenticator, Identity, JwtAuthenticator, StaticAuthenticator};
pub use commands::{CommandHandler, DomainCommand, LocalChannels, MAX_CONTENT_LENGTH};
