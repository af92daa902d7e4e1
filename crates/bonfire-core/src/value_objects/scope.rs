//! Subscription scopes
//!
//! A scope names one stream of domain events. Wire form is `kind:id`,
//! e.g. `channel:42` or `user:7`, or the bare word `presence`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::Snowflake;

/// A stream of domain events a session can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// Message and typing events of one text channel
    Channel(Snowflake),
    /// Presence changes of one user
    User(Snowflake),
    /// Presence changes of every user
    Presence,
}

impl Scope {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Channel(_) => "channel",
            Self::User(_) => "user",
            Self::Presence => "presence",
        }
    }

    /// Target id; `None` for the global presence stream
    pub const fn id(&self) -> Option<Snowflake> {
        match self {
            Self::Channel(id) | Self::User(id) => Some(*id),
            Self::Presence => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeParseError {
    #[error("scope must have the form `kind:id`, got `{0}`")]
    MissingSeparator(String),

    #[error("unknown scope kind `{0}`")]
    UnknownKind(String),

    #[error("invalid scope id `{0}`")]
    InvalidId(String),
}

impl FromStr for Scope {
    type Err = ScopeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim() == "presence" {
            return Ok(Self::Presence);
        }

        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| ScopeParseError::MissingSeparator(s.to_string()))?;

        let id = Snowflake::parse(id.trim())
            .ok()
            .filter(|id| id.into_inner() > 0)
            .ok_or_else(|| ScopeParseError::InvalidId(id.to_string()))?;

        match kind.trim() {
            "channel" => Ok(Self::Channel(id)),
            "user" => Ok(Self::User(id)),
            other => Err(ScopeParseError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id() {
            Some(id) => write!(f, "{}:{id}", self.kind()),
            None => f.write_str(self.kind()),
        }
    }
}

impl Serialize for Scope {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Scope {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_channel_scope() {
        let scope: Scope = "channel:42".parse().unwrap();
        assert_eq!(scope, Scope::Channel(Snowflake::new(42)));
        assert_eq!(scope.to_string(), "channel:42");
    }

    #[test]
    fn test_parse_user_scope() {
        let scope: Scope = "user:7".parse().unwrap();
        assert_eq!(scope, Scope::User(Snowflake::new(7)));
        assert_eq!(scope.kind(), "user");
    }

    #[test]
    fn test_parse_presence_scope() {
        let scope: Scope = "presence".parse().unwrap();
        assert_eq!(scope, Scope::Presence);
        assert_eq!(scope.id(), None);
        assert_eq!(scope.to_string(), "presence");
        assert!(matches!(
            "presence:1".parse::<Scope>(),
            Err(ScopeParseError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "channel42".parse::<Scope>(),
            Err(ScopeParseError::MissingSeparator("channel42".to_string()))
        );
        assert_eq!(
            "guild:1".parse::<Scope>(),
            Err(ScopeParseError::UnknownKind("guild".to_string()))
        );
        assert!(matches!(
            "channel:abc".parse::<Scope>(),
            Err(ScopeParseError::InvalidId(_))
        ));
        assert!(matches!(
            "channel:0".parse::<Scope>(),
            Err(ScopeParseError::InvalidId(_))
        ));
    }

    #[test]
    fn test_scope_serde_as_string() {
        let scope = Scope::Channel(Snowflake::new(42));
        assert_eq!(serde_json::to_string(&scope).unwrap(), "\"channel:42\"");
        let parsed: Scope = serde_json::from_str("\"channel:42\"").unwrap();
        assert_eq!(parsed, scope);
    }
}
