//! Domain command seam
//!
//! Commands that change domain state leave the gateway through a
//! [`CommandHandler`]. The handler answers with the events the change
//! produced; the router publishes them after the call returns.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use bonfire_core::{DomainError, DomainEvent, PresenceStatus, Scope, Snowflake, SnowflakeGenerator};
use chrono::Utc;

use super::Identity;

/// Maximum message length in characters
pub const MAX_CONTENT_LENGTH: usize = 2000;

/// A client command that crosses into the domain layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainCommand {
    SendMessage {
        channel_id: Snowflake,
        content: String,
    },
    StartTyping {
        channel_id: Snowflake,
    },
    UpdatePresence {
        status: PresenceStatus,
    },
}

impl DomainCommand {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SendMessage { .. } => "send_message",
            Self::StartTyping { .. } => "start_typing",
            Self::UpdatePresence { .. } => "update_presence",
        }
    }
}

/// Executes client commands on behalf of an identity
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Decide whether `identity` may subscribe to `scope`
    async fn authorize_subscription(
        &self,
        _identity: &Identity,
        _scope: &Scope,
    ) -> Result<(), DomainError> {
        Ok(())
    }

    /// Apply a command and return the events it produced
    async fn execute(
        &self,
        identity: &Identity,
        command: DomainCommand,
    ) -> Result<Vec<DomainEvent>, DomainError>;
}

/// In-process text channels
///
/// Stamps message ids and echoes commands back as events. Nothing is stored.
#[derive(Debug)]
pub struct LocalChannels {
    ids: Arc<SnowflakeGenerator>,
    read_only: HashSet<Snowflake>,
    max_content: usize,
}

impl LocalChannels {
    pub fn new(ids: Arc<SnowflakeGenerator>) -> Self {
        Self {
            ids,
            read_only: HashSet::new(),
            max_content: MAX_CONTENT_LENGTH,
        }
    }

    /// Reject `send_message` in `channel_id`
    #[must_use]
    pub fn with_read_only(mut self, channel_id: Snowflake) -> Self {
        self.read_only.insert(channel_id);
        self
    }

    fn check_channel(channel_id: Snowflake) -> Result<(), DomainError> {
        if channel_id.into_inner() <= 0 {
            return Err(DomainError::ChannelNotFound(channel_id));
        }
        Ok(())
    }
}

#[async_trait]
impl CommandHandler for LocalChannels {
    async fn authorize_subscription(
        &self,
        identity: &Identity,
        scope: &Scope,
    ) -> Result<(), DomainError> {
        match scope {
            Scope::Channel(id) => Self::check_channel(*id),
            Scope::User(id) if id.into_inner() <= 0 => {
                Err(DomainError::SubscriptionDenied(*scope))
            }
            Scope::User(_) | Scope::Presence => {
                tracing::trace!(user_id = %identity.user_id, scope = %scope, "Subscription authorized");
                Ok(())
            }
        }
    }

    async fn execute(
        &self,
        identity: &Identity,
        command: DomainCommand,
    ) -> Result<Vec<DomainEvent>, DomainError> {
        let now = Utc::now().timestamp_millis();

        match command {
            DomainCommand::SendMessage {
                channel_id,
                content,
            } => {
                Self::check_channel(channel_id)?;
                if self.read_only.contains(&channel_id) {
                    return Err(DomainError::CannotSendMessages);
                }

                let content = content.trim();
                if content.is_empty() {
                    return Err(DomainError::ValidationError(
                        "content must not be empty".to_string(),
                    ));
                }
                if content.chars().count() > self.max_content {
                    return Err(DomainError::ContentTooLong {
                        max: self.max_content,
                    });
                }

                Ok(vec![DomainEvent::MessageCreated {
                    channel_id,
                    message_id: self.ids.generate(),
                    author_id: identity.user_id,
                    content: content.to_string(),
                    timestamp_ms: now,
                }])
            }
            DomainCommand::StartTyping { channel_id } => {
                Self::check_channel(channel_id)?;
                Ok(vec![DomainEvent::TypingStarted {
                    channel_id,
                    user_id: identity.user_id,
                    timestamp_ms: now,
                }])
            }
            DomainCommand::UpdatePresence { status } => Ok(vec![DomainEvent::PresenceUpdated {
                user_id: identity.user_id,
                status,
            }]),
        }
    }
}
