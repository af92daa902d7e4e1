//! Test fixtures and payload builders
//!
//! Provides the known tokens and reusable payloads for integration tests.

use bonfire_core::{DomainEvent, Snowflake};
use bonfire_gateway::protocol::payloads::{
    HeartbeatCommand, IdentifyMessage, SendMessageCommand, SubscribeCommand,
};
use bonfire_gateway::protocol::{Capabilities, Payload};

/// Token accepted by the test server's authenticator
pub const ALICE_TOKEN: &str = "alice-token";
pub const ALICE_ID: i64 = 1001;

pub const BOB_TOKEN: &str = "bob-token";
pub const BOB_ID: i64 = 1002;

/// Channel where `send_message` is always refused
pub const READ_ONLY_CHANNEL: i64 = 900;

pub fn identify(token: &str) -> Payload {
    Payload::Identify(IdentifyMessage {
        token: token.to_string(),
        capabilities: Capabilities::all().bits(),
        client_agent: "integration-tests/1.0".to_string(),
    })
}

/// Subscribe to every event kind in `scope`
pub fn subscribe(scope: &str) -> Payload {
    Payload::Subscribe(SubscribeCommand {
        scope: scope.to_string(),
        events: 0,
    })
}

pub fn send_message(channel_id: u64, content: &str) -> Payload {
    Payload::SendMessage(SendMessageCommand {
        channel_id,
        content: content.to_string(),
    })
}

pub fn heartbeat(last_seq: u64) -> Payload {
    Payload::Heartbeat(HeartbeatCommand { last_seq })
}

/// A `message_created` event as the domain would publish it
pub fn message_created(channel_id: i64, message_id: i64) -> DomainEvent {
    DomainEvent::MessageCreated {
        channel_id: Snowflake::new(channel_id),
        message_id: Snowflake::new(message_id),
        author_id: Snowflake::new(BOB_ID),
        content: format!("message #{message_id}"),
        timestamp_ms: 1_700_000_000_000 + message_id,
    }
}
