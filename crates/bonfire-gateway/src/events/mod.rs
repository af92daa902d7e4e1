//! Dispatch events
//!
//! Maps domain events onto their wire payloads.

use bonfire_core::DomainEvent;

use crate::protocol::payloads::{
    MessageCreatedEvent, MessageDeletedEvent, MessageUpdatedEvent, PresenceUpdatedEvent,
    TypingStartedEvent,
};
use crate::protocol::Payload;

impl From<&DomainEvent> for Payload {
    fn from(event: &DomainEvent) -> Self {
        match event {
            DomainEvent::MessageCreated {
                channel_id,
                message_id,
                author_id,
                content,
                timestamp_ms,
            } => Self::MessageCreated(MessageCreatedEvent {
                channel_id: channel_id.as_u64(),
                message_id: message_id.as_u64(),
                author_id: author_id.as_u64(),
                content: content.clone(),
                timestamp_ms: *timestamp_ms,
            }),
            DomainEvent::MessageUpdated {
                channel_id,
                message_id,
                content,
                edited_timestamp_ms,
            } => Self::MessageUpdated(MessageUpdatedEvent {
                channel_id: channel_id.as_u64(),
                message_id: message_id.as_u64(),
                content: content.clone(),
                edited_timestamp_ms: *edited_timestamp_ms,
            }),
            DomainEvent::MessageDeleted {
                channel_id,
                message_id,
            } => Self::MessageDeleted(MessageDeletedEvent {
                channel_id: channel_id.as_u64(),
                message_id: message_id.as_u64(),
            }),
            DomainEvent::TypingStarted {
                channel_id,
                user_id,
                timestamp_ms,
            } => Self::TypingStarted(TypingStartedEvent {
                channel_id: channel_id.as_u64(),
                user_id: user_id.as_u64(),
                timestamp_ms: *timestamp_ms,
            }),
            DomainEvent::PresenceUpdated { user_id, status } => {
                Self::PresenceUpdated(PresenceUpdatedEvent {
                    user_id: user_id.as_u64(),
                    status: status.as_str().to_string(),
                })
            }
        }
    }
}
