//! Domain events - produced by the domain collaborators, fanned out by the gateway
//!
//! Every event belongs to exactly one [`Scope`]; sessions subscribed to that
//! scope receive it.

use serde::{Deserialize, Serialize};

use crate::value_objects::{EventKinds, Scope, Snowflake};

/// Events the gateway knows how to route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainEvent {
    // =========================================================================
    // Message Events
    // =========================================================================
    MessageCreated {
        channel_id: Snowflake,
        message_id: Snowflake,
        author_id: Snowflake,
        content: String,
        timestamp_ms: i64,
    },
    MessageUpdated {
        channel_id: Snowflake,
        message_id: Snowflake,
        content: String,
        edited_timestamp_ms: i64,
    },
    MessageDeleted {
        channel_id: Snowflake,
        message_id: Snowflake,
    },

    // =========================================================================
    // Ephemeral Events
    // =========================================================================
    TypingStarted {
        channel_id: Snowflake,
        user_id: Snowflake,
        timestamp_ms: i64,
    },
    PresenceUpdated {
        user_id: Snowflake,
        status: PresenceStatus,
    },
}

/// User presence as reported by the presence collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Idle,
    #[serde(rename = "dnd")]
    DoNotDisturb,
    #[default]
    Offline,
}

impl PresenceStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Idle => "idle",
            Self::DoNotDisturb => "dnd",
            Self::Offline => "offline",
        }
    }

    /// Parse a wire status, returning `None` for unknown values
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "online" => Some(Self::Online),
            "idle" => Some(Self::Idle),
            "dnd" => Some(Self::DoNotDisturb),
            "offline" => Some(Self::Offline),
            _ => None,
        }
    }
}

impl DomainEvent {
    /// The primary scope whose subscribers receive this event
    pub fn scope(&self) -> Scope {
        match self {
            Self::MessageCreated { channel_id, .. }
            | Self::MessageUpdated { channel_id, .. }
            | Self::MessageDeleted { channel_id, .. }
            | Self::TypingStarted { channel_id, .. } => Scope::Channel(*channel_id),
            Self::PresenceUpdated { user_id, .. } => Scope::User(*user_id),
        }
    }

    /// Every scope whose subscribers receive this event
    ///
    /// Presence changes also flow to the global `presence` stream.
    pub fn scopes(&self) -> Vec<Scope> {
        match self {
            Self::PresenceUpdated { .. } => vec![self.scope(), Scope::Presence],
            _ => vec![self.scope()],
        }
    }

    /// The filter flag this event is matched against
    pub fn kind(&self) -> EventKinds {
        match self {
            Self::MessageCreated { .. } => EventKinds::MESSAGE_CREATE,
            Self::MessageUpdated { .. } => EventKinds::MESSAGE_UPDATE,
            Self::MessageDeleted { .. } => EventKinds::MESSAGE_DELETE,
            Self::TypingStarted { .. } => EventKinds::TYPING,
            Self::PresenceUpdated { .. } => EventKinds::PRESENCE,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::MessageCreated { .. } => "MESSAGE_CREATED",
            Self::MessageUpdated { .. } => "MESSAGE_UPDATED",
            Self::MessageDeleted { .. } => "MESSAGE_DELETED",
            Self::TypingStarted { .. } => "TYPING_STARTED",
            Self::PresenceUpdated { .. } => "PRESENCE_UPDATED",
        }
    }
}
