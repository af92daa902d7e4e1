//! Transport-level connection metadata

use std::fmt;
use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::handshake::Negotiated;
use crate::protocol::{Encoding, ProtocolVersion};

/// Process-unique connection identifier, used in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An upgraded WebSocket whose negotiation succeeded
///
/// Owned by the connection task; the session only records its id.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    remote_addr: SocketAddr,
    encoding: Encoding,
    /// `version` query parameter as sent, if any
    requested_version: Option<String>,
    version: ProtocolVersion,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
}

impl Connection {
    pub fn new(
        remote_addr: SocketAddr,
        negotiated: Negotiated,
        requested_version: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            remote_addr,
            encoding: negotiated.encoding,
            requested_version,
            version: negotiated.version,
            user_agent,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Server -> client encoding
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn requested_version(&self) -> Option<&str> {
        self.requested_version.as_deref()
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
