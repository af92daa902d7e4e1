//! Client commands, validated
//!
//! Turns a decoded command payload into typed values before it reaches the
//! router. Invalid values are domain failures, not protocol violations: the
//! session gets an error envelope and stays open.

use bonfire_core::{DomainError, EventKinds, PresenceStatus, Scope, Snowflake};

use crate::collaborators::DomainCommand;
use crate::protocol::Payload;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    pub scope: Scope,
    pub events: EventKinds,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Subscribe(Subscription),
    Unsubscribe(Scope),
    Heartbeat { last_seq: u64 },
    Domain(DomainCommand),
}

impl Command {
    pub fn parse(payload: Payload) -> Result<Self, DomainError> {
        match payload {
            Payload::Subscribe(cmd) => Ok(Self::Subscribe(Subscription {
                scope: parse_scope(&cmd.scope)?,
                events: EventKinds::from_filter_bits(cmd.events),
            })),
            Payload::Unsubscribe(cmd) => Ok(Self::Unsubscribe(parse_scope(&cmd.scope)?)),
            Payload::Heartbeat(cmd) => Ok(Self::Heartbeat {
                last_seq: cmd.last_seq,
            }),
            Payload::SendMessage(cmd) => Ok(Self::Domain(DomainCommand::SendMessage {
                channel_id: parse_channel(cmd.channel_id)?,
                content: cmd.content,
            })),
            Payload::StartTyping(cmd) => Ok(Self::Domain(DomainCommand::StartTyping {
                channel_id: parse_channel(cmd.channel_id)?,
            })),
            Payload::UpdatePresence(cmd) => {
                let status = PresenceStatus::parse(&cmd.status).ok_or_else(|| {
                    DomainError::ValidationError(format!("unknown presence status `{}`", cmd.status))
                })?;
                Ok(Self::Domain(DomainCommand::UpdatePresence { status }))
            }
            other => Err(DomainError::ValidationError(format!(
                "`{}` is not a command",
                other.name()
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Subscribe(_) => "subscribe",
            Self::Unsubscribe(_) => "unsubscribe",
            Self::Heartbeat { .. } => "heartbeat",
            Self::Domain(cmd) => cmd.name(),
        }
    }
}

fn parse_scope(raw: &str) -> Result<Scope, DomainError> {
    raw.parse()
        .map_err(|e: bonfire_core::ScopeParseError| DomainError::InvalidScope(e.to_string()))
}

fn parse_channel(id: u64) -> Result<Snowflake, DomainError> {
    let id = Snowflake::from_u64(id);
    if id.into_inner() <= 0 {
        return Err(DomainError::ValidationError(
            "channel_id is required".to_string(),
        ));
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::payloads::{
        HeartbeatCommand, ReadyMessage, SendMessageCommand, SubscribeCommand,
        UpdatePresenceCommand,
    };

    #[test]
    fn test_parse_subscribe() {
        let cmd = Command::parse(Payload::Subscribe(SubscribeCommand {
            scope: "channel:42".to_string(),
            events: 0,
        }))
        .unwrap();

        assert_eq!(
            cmd,
            Command::Subscribe(Subscription {
                scope: Scope::Channel(Snowflake::new(42)),
                events: EventKinds::all(),
            })
        );
        assert_eq!(cmd.name(), "subscribe");
    }

    #[test]
    fn test_parse_invalid_scope() {
        let err = Command::parse(Payload::Subscribe(SubscribeCommand {
            scope: "guild:1".to_string(),
            events: 0,
        }))
        .unwrap_err();
        assert_eq!(err.code(), "INVALID_SCOPE");
    }

    #[test]
    fn test_parse_send_message() {
        let cmd = Command::parse(Payload::SendMessage(SendMessageCommand {
            channel_id: 5,
            content: "hi".to_string(),
        }))
        .unwrap();
        assert_eq!(
            cmd,
            Command::Domain(DomainCommand::SendMessage {
                channel_id: Snowflake::new(5),
                content: "hi".to_string(),
            })
        );

        let err = Command::parse(Payload::SendMessage(SendMessageCommand::default())).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_parse_presence_and_heartbeat() {
        assert!(Command::parse(Payload::UpdatePresence(UpdatePresenceCommand {
            status: "away".to_string(),
        }))
        .is_err());

        assert_eq!(
            Command::parse(Payload::Heartbeat(HeartbeatCommand { last_seq: 4 })).unwrap(),
            Command::Heartbeat { last_seq: 4 }
        );
    }

    #[test]
    fn test_parse_non_command() {
        assert!(Command::parse(Payload::Ready(ReadyMessage::default())).is_err());
    }
}
