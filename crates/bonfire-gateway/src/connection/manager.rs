//! Session registry
//!
//! Sharded maps (`DashMap`) for lookup by session id, connection, identity
//! and scope, plus one mutex per session for its subscription set. Unrelated
//! sessions never contend on the same lock.
//!
//! Lock order: a session's subscription lock may be held while touching a
//! `by_scope` shard, never the other way around.

use std::collections::HashSet;
use std::sync::Arc;

use bonfire_core::{EventKinds, Scope, Snowflake, SnowflakeGenerator};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::outbound::OutboundConfig;
use super::{Connection, ConnectionId, Session, SessionId};
use crate::collaborators::Identity;
use crate::error::{GatewayError, GatewayResult};
use crate::protocol::Capabilities;

pub struct SessionManager {
    sessions: DashMap<SessionId, Arc<Session>>,
    by_connection: DashMap<ConnectionId, SessionId>,
    by_identity: DashMap<Snowflake, HashSet<SessionId>>,
    by_scope: DashMap<Scope, HashSet<SessionId>>,
    ids: Arc<SnowflakeGenerator>,
    outbound: OutboundConfig,
}

impl SessionManager {
    pub fn new(ids: Arc<SnowflakeGenerator>, outbound: OutboundConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            by_connection: DashMap::new(),
            by_identity: DashMap::new(),
            by_scope: DashMap::new(),
            ids,
            outbound,
        }
    }

    /// Create a new session manager wrapped in Arc
    pub fn new_shared(ids: Arc<SnowflakeGenerator>, outbound: OutboundConfig) -> Arc<Self> {
        Arc::new(Self::new(ids, outbound))
    }

    /// Register a session for an identified connection
    ///
    /// The session inherits the connection's encoding and version.
    pub fn create(
        &self,
        connection: &Connection,
        identity: Identity,
        capabilities: Capabilities,
    ) -> GatewayResult<Arc<Session>> {
        let slot = match self.by_connection.entry(connection.id()) {
            Entry::Occupied(_) => {
                return Err(GatewayError::DuplicateConnection(connection.id()));
            }
            Entry::Vacant(slot) => slot,
        };

        let id = SessionId::new(self.ids.generate());
        let user_id = identity.user_id;
        let session = Session::new(
            id,
            connection.id(),
            identity,
            connection.encoding(),
            connection.version(),
            capabilities,
            self.outbound,
        );

        self.sessions.insert(id, Arc::clone(&session));
        slot.insert(id);
        self.by_identity.entry(user_id).or_default().insert(id);

        tracing::debug!(
            session_id = %id,
            connection_id = %connection.id(),
            user_id = %user_id,
            "Session created"
        );

        Ok(session)
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|r| Arc::clone(r.value()))
    }

    pub fn get_by_connection(&self, connection_id: ConnectionId) -> Option<Arc<Session>> {
        let id = *self.by_connection.get(&connection_id)?;
        self.get(id)
    }

    /// Add or replace the subscription to `scope`
    ///
    /// Returns `true` if the subscription set changed.
    pub fn subscribe(&self, id: SessionId, scope: Scope, kinds: EventKinds) -> GatewayResult<bool> {
        let session = self.get(id).ok_or(GatewayError::SessionNotFound(id))?;

        let mut subs = session.subscriptions.lock();
        if subs.released {
            return Err(GatewayError::SessionNotFound(id));
        }

        let changed = subs.scopes.insert(scope, kinds) != Some(kinds);
        self.by_scope.entry(scope).or_default().insert(id);

        if changed {
            tracing::trace!(session_id = %id, scope = %scope, "Session subscribed");
        }
        Ok(changed)
    }

    /// Remove the subscription to `scope`
    ///
    /// Returns `true` if the session was subscribed.
    pub fn unsubscribe(&self, id: SessionId, scope: Scope) -> GatewayResult<bool> {
        let session = self.get(id).ok_or(GatewayError::SessionNotFound(id))?;

        let mut subs = session.subscriptions.lock();
        if subs.released {
            return Err(GatewayError::SessionNotFound(id));
        }

        if subs.scopes.remove(&scope).is_none() {
            return Ok(false);
        }
        self.release_scope(id, scope);

        tracing::trace!(session_id = %id, scope = %scope, "Session unsubscribed");
        Ok(true)
    }

    fn release_scope(&self, id: SessionId, scope: Scope) {
        if let Some(mut members) = self.by_scope.get_mut(&scope) {
            members.remove(&id);
        }
        // the shard guard above is dropped before `remove_if` takes it again
        self.by_scope.remove_if(&scope, |_, members| members.is_empty());
    }

    /// Remove a session and release everything it holds
    ///
    /// Safe to call concurrently with delivery: pushes to the destroyed
    /// session are discarded. Returns the session if it existed.
    pub fn destroy(&self, id: SessionId) -> Option<Arc<Session>> {
        let (_, session) = self.sessions.remove(&id)?;

        self.by_connection
            .remove_if(&session.connection_id(), |_, owner| *owner == id);

        let user_id = session.user_id();
        if let Some(mut owned) = self.by_identity.get_mut(&user_id) {
            owned.remove(&id);
        }
        self.by_identity.remove_if(&user_id, |_, owned| owned.is_empty());

        {
            let mut subs = session.subscriptions.lock();
            subs.released = true;
            for (scope, _) in subs.scopes.drain() {
                self.release_scope(id, scope);
            }
        }

        session.shutdown();

        tracing::debug!(
            session_id = %id,
            user_id = %user_id,
            "Session destroyed"
        );

        Some(session)
    }

    /// Sessions subscribed to `scope`
    pub fn subscribers(&self, scope: &Scope) -> Vec<Arc<Session>> {
        let ids: Vec<SessionId> = match self.by_scope.get(scope) {
            Some(members) => members.iter().copied().collect(),
            None => return Vec::new(),
        };

        ids.into_iter().filter_map(|id| self.get(id)).collect()
    }

    /// Sessions of one user
    pub fn sessions_for_identity(&self, user_id: Snowflake) -> Vec<Arc<Session>> {
        let ids: Vec<SessionId> = match self.by_identity.get(&user_id) {
            Some(owned) => owned.iter().copied().collect(),
            None => return Vec::new(),
        };

        ids.into_iter().filter_map(|id| self.get(id)).collect()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of distinct identities with at least one session
    pub fn identity_count(&self) -> usize {
        self.by_identity.len()
    }

    /// Number of scopes with at least one subscriber
    pub fn scope_count(&self) -> usize {
        self.by_scope.len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(Arc::new(SnowflakeGenerator::default()), OutboundConfig::default())
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.sessions.len())
            .field("identities", &self.by_identity.len())
            .field("scopes", &self.by_scope.len())
            .finish()
    }
}
