//! Payload definitions
//!
//! Each struct is both a protobuf message (`prost`) and a JSON object (`serde`).
//! Field tags are part of the wire contract; never reuse a retired tag.

use serde::{Deserialize, Serialize};

// ============================================================================
// Bootstrap
// ============================================================================

/// First envelope on every connection, sent by the server
#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeMessage {
    /// Negotiated protocol major version
    #[prost(uint32, tag = "1")]
    pub version: u32,
    /// Schema revision within `version`
    #[prost(uint32, tag = "2")]
    pub revision: u32,
    /// Capability flags the server offers
    #[prost(uint32, tag = "3")]
    pub capabilities: u32,
    #[prost(uint64, tag = "4")]
    pub heartbeat_interval_ms: u64,
}

/// The client's answer to the handshake
#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifyMessage {
    /// Identity material, opaque to the gateway
    #[prost(string, tag = "1")]
    pub token: String,
    /// Capability flags the client requests
    #[prost(uint32, tag = "2")]
    pub capabilities: u32,
    /// Free-form client name/version for diagnostics
    #[prost(string, tag = "3")]
    pub client_agent: String,
}

/// Confirms a successful Identify
#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadyMessage {
    #[prost(uint64, tag = "1")]
    #[serde(with = "super::ids")]
    pub session_id: u64,
    #[prost(uint64, tag = "2")]
    #[serde(with = "super::ids")]
    pub user_id: u64,
    #[prost(uint32, tag = "3")]
    pub version: u32,
    #[prost(uint32, tag = "4")]
    pub revision: u32,
    /// Intersection of client-requested and server-offered capabilities
    #[prost(uint32, tag = "5")]
    pub capabilities: u32,
}

// ============================================================================
// Commands (client -> server)
// ============================================================================

#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscribeCommand {
    /// Scope in `kind:id` form, e.g. `channel:42`
    #[prost(string, tag = "1")]
    pub scope: String,
    /// Event kind filter bits; zero subscribes to every kind
    #[prost(uint32, tag = "2")]
    pub events: u32,
}

#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct UnsubscribeCommand {
    #[prost(string, tag = "1")]
    pub scope: String,
}

#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct SendMessageCommand {
    #[prost(uint64, tag = "1")]
    #[serde(with = "super::ids")]
    pub channel_id: u64,
    #[prost(string, tag = "2")]
    pub content: String,
}

#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct StartTypingCommand {
    #[prost(uint64, tag = "1")]
    #[serde(with = "super::ids")]
    pub channel_id: u64,
}

#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdatePresenceCommand {
    /// One of `online`, `idle`, `dnd`, `offline`
    #[prost(string, tag = "1")]
    pub status: String,
}

#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatCommand {
    /// Highest sequence number the client has processed
    #[prost(uint64, tag = "1")]
    pub last_seq: u64,
}

// ============================================================================
// Control replies (server -> client, unsequenced)
// ============================================================================

#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscribedMessage {
    #[prost(string, tag = "1")]
    pub scope: String,
    #[prost(uint32, tag = "2")]
    pub events: u32,
}

#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct UnsubscribedMessage {
    #[prost(string, tag = "1")]
    pub scope: String,
}

#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatAckMessage {
    /// Last sequence number the server has handed to the transport
    #[prost(uint64, tag = "1")]
    pub last_seq: u64,
}

/// A command failed; the session stays open
#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorMessage {
    /// Stable machine-readable code, e.g. `CONTENT_TOO_LONG`
    #[prost(string, tag = "1")]
    pub code: String,
    #[prost(string, tag = "2")]
    pub message: String,
    /// Variant name of the command that failed
    #[prost(string, tag = "3")]
    pub command: String,
}

// ============================================================================
// Dispatch events (server -> client, sequenced)
// ============================================================================

#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageCreatedEvent {
    #[prost(uint64, tag = "1")]
    #[serde(with = "super::ids")]
    pub channel_id: u64,
    #[prost(uint64, tag = "2")]
    #[serde(with = "super::ids")]
    pub message_id: u64,
    #[prost(uint64, tag = "3")]
    #[serde(with = "super::ids")]
    pub author_id: u64,
    #[prost(string, tag = "4")]
    pub content: String,
    #[prost(int64, tag = "5")]
    pub timestamp_ms: i64,
}

#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageUpdatedEvent {
    #[prost(uint64, tag = "1")]
    #[serde(with = "super::ids")]
    pub channel_id: u64,
    #[prost(uint64, tag = "2")]
    #[serde(with = "super::ids")]
    pub message_id: u64,
    #[prost(string, tag = "3")]
    pub content: String,
    #[prost(int64, tag = "4")]
    pub edited_timestamp_ms: i64,
}

#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageDeletedEvent {
    #[prost(uint64, tag = "1")]
    #[serde(with = "super::ids")]
    pub channel_id: u64,
    #[prost(uint64, tag = "2")]
    #[serde(with = "super::ids")]
    pub message_id: u64,
}

#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct TypingStartedEvent {
    #[prost(uint64, tag = "1")]
    #[serde(with = "super::ids")]
    pub channel_id: u64,
    #[prost(uint64, tag = "2")]
    #[serde(with = "super::ids")]
    pub user_id: u64,
    #[prost(int64, tag = "3")]
    pub timestamp_ms: i64,
}

#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceUpdatedEvent {
    #[prost(uint64, tag = "1")]
    #[serde(with = "super::ids")]
    pub user_id: u64,
    #[prost(string, tag = "2")]
    pub status: String,
}

/// Events were dropped for this session because it fell behind
#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsMissedEvent {
    #[prost(uint64, tag = "1")]
    pub count: u64,
}
