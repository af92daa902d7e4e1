//! Gateway envelope format
//!
//! Every frame carries exactly one [`Envelope`]. The payload is a closed sum
//! type: protobuf models it as a `oneof`, JSON as a single-key object.
//!
//! ```json
//! {"seq": 1, "payload": {"message_created": {"channel_id": "42", ...}}}
//! ```

use serde::{Deserialize, Serialize};

use super::payloads::{
    ErrorMessage, EventsMissedEvent, HandshakeMessage, HeartbeatAckMessage, HeartbeatCommand,
    IdentifyMessage, MessageCreatedEvent, MessageDeletedEvent, MessageUpdatedEvent,
    PresenceUpdatedEvent, ReadyMessage, SendMessageCommand, StartTypingCommand,
    SubscribeCommand, SubscribedMessage, TypingStartedEvent, UnsubscribeCommand,
    UnsubscribedMessage, UpdatePresenceCommand,
};

/// Protobuf tag of [`Envelope::seq`]
pub const SEQ_TAG: u32 = 1;

/// Protobuf tags used by the [`Payload`] oneof
pub const PAYLOAD_TAGS: std::ops::RangeInclusive<u32> = 2..=20;

/// The unit of wire exchange
#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope {
    /// Server-assigned sequence number; zero on client envelopes and control replies
    #[prost(uint64, tag = "1")]
    #[serde(default, skip_serializing_if = "is_zero")]
    pub seq: u64,

    #[prost(
        oneof = "Payload",
        tags = "2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20"
    )]
    #[serde(default)]
    pub payload: Option<Payload>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(seq: &u64) -> bool {
    *seq == 0
}

/// Every payload kind the gateway speaks
#[derive(Clone, PartialEq, Eq, prost::Oneof, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    // Bootstrap
    #[prost(message, tag = "2")]
    Handshake(HandshakeMessage),
    #[prost(message, tag = "3")]
    Identify(IdentifyMessage),
    #[prost(message, tag = "4")]
    Ready(ReadyMessage),

    // Commands
    #[prost(message, tag = "5")]
    Subscribe(SubscribeCommand),
    #[prost(message, tag = "6")]
    Unsubscribe(UnsubscribeCommand),
    #[prost(message, tag = "7")]
    SendMessage(SendMessageCommand),
    #[prost(message, tag = "8")]
    StartTyping(StartTypingCommand),
    #[prost(message, tag = "9")]
    UpdatePresence(UpdatePresenceCommand),
    #[prost(message, tag = "10")]
    Heartbeat(HeartbeatCommand),

    // Control replies
    #[prost(message, tag = "11")]
    Subscribed(SubscribedMessage),
    #[prost(message, tag = "12")]
    Unsubscribed(UnsubscribedMessage),
    #[prost(message, tag = "13")]
    HeartbeatAck(HeartbeatAckMessage),
    #[prost(message, tag = "14")]
    Error(ErrorMessage),

    // Dispatch events
    #[prost(message, tag = "15")]
    MessageCreated(MessageCreatedEvent),
    #[prost(message, tag = "16")]
    MessageUpdated(MessageUpdatedEvent),
    #[prost(message, tag = "17")]
    MessageDeleted(MessageDeletedEvent),
    #[prost(message, tag = "18")]
    TypingStarted(TypingStartedEvent),
    #[prost(message, tag = "19")]
    PresenceUpdated(PresenceUpdatedEvent),
    #[prost(message, tag = "20")]
    EventsMissed(EventsMissedEvent),
}

/// Role a payload plays in the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadClass {
    /// Client -> server, before `Identified` only
    Bootstrap,
    /// Client -> server, after `Identified` only
    Command,
    /// Server -> client, never sequenced, never dropped
    Control,
    /// Server -> client, sequenced, droppable under backpressure
    Dispatch,
}

impl Payload {
    /// Wire name of the variant (the JSON key)
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Handshake(_) => "handshake",
            Self::Identify(_) => "identify",
            Self::Ready(_) => "ready",
            Self::Subscribe(_) => "subscribe",
            Self::Unsubscribe(_) => "unsubscribe",
            Self::SendMessage(_) => "send_message",
            Self::StartTyping(_) => "start_typing",
            Self::UpdatePresence(_) => "update_presence",
            Self::Heartbeat(_) => "heartbeat",
            Self::Subscribed(_) => "subscribed",
            Self::Unsubscribed(_) => "unsubscribed",
            Self::HeartbeatAck(_) => "heartbeat_ack",
            Self::Error(_) => "error",
            Self::MessageCreated(_) => "message_created",
            Self::MessageUpdated(_) => "message_updated",
            Self::MessageDeleted(_) => "message_deleted",
            Self::TypingStarted(_) => "typing_started",
            Self::PresenceUpdated(_) => "presence_updated",
            Self::EventsMissed(_) => "events_missed",
        }
    }

    pub const fn class(&self) -> PayloadClass {
        match self {
            Self::Identify(_) => PayloadClass::Bootstrap,
            Self::Subscribe(_)
            | Self::Unsubscribe(_)
            | Self::SendMessage(_)
            | Self::StartTyping(_)
            | Self::UpdatePresence(_)
            | Self::Heartbeat(_) => PayloadClass::Command,
            Self::Handshake(_)
            | Self::Ready(_)
            | Self::Subscribed(_)
            | Self::Unsubscribed(_)
            | Self::HeartbeatAck(_)
            | Self::Error(_) => PayloadClass::Control,
            Self::MessageCreated(_)
            | Self::MessageUpdated(_)
            | Self::MessageDeleted(_)
            | Self::TypingStarted(_)
            | Self::PresenceUpdated(_)
            | Self::EventsMissed(_) => PayloadClass::Dispatch,
        }
    }

    /// Whether clients may send this payload
    pub const fn is_client_payload(&self) -> bool {
        matches!(self.class(), PayloadClass::Bootstrap | PayloadClass::Command)
    }

    /// Whether the payload consumes an outbound sequence number
    pub const fn is_sequenced(&self) -> bool {
        matches!(self.class(), PayloadClass::Dispatch)
    }

    /// Whether backpressure may never drop this payload
    pub const fn is_critical(&self) -> bool {
        !self.is_sequenced()
    }
}

impl Envelope {
    /// Unsequenced envelope (control replies and client envelopes)
    pub fn unsequenced(payload: Payload) -> Self {
        Self {
            seq: 0,
            payload: Some(payload),
        }
    }

    pub fn sequenced(seq: u64, payload: Payload) -> Self {
        Self {
            seq,
            payload: Some(payload),
        }
    }
}

impl From<Payload> for Envelope {
    fn from(payload: Payload) -> Self {
        Self::unsequenced(payload)
    }
}
