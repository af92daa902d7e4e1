//! Authenticated gateway session
//!
//! A session lives exactly as long as its connection. It owns the
//! subscription set, the outbound queue and the outbound sequence counter.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bonfire_core::{DomainEvent, EventKinds, Scope, Snowflake};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::outbound::{Batch, OutboundConfig, OutboundQueue, PushOutcome};
use super::ConnectionId;
use crate::collaborators::Identity;
use crate::protocol::payloads::EventsMissedEvent;
use crate::protocol::{Capabilities, CloseCode, Encoding, Envelope, Payload, ProtocolVersion};

/// Process-unique session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Snowflake);

impl SessionId {
    pub const fn new(id: Snowflake) -> Self {
        Self(id)
    }

    pub const fn as_snowflake(&self) -> Snowflake {
        self.0
    }

    pub const fn as_u64(&self) -> u64 {
        self.0.as_u64()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Subscriptions of one session
#[derive(Debug, Default)]
pub(crate) struct SubscriptionSet {
    pub(crate) scopes: HashMap<Scope, EventKinds>,
    /// The session was destroyed; no further subscriptions may be added
    pub(crate) released: bool,
}

/// What the writer should put on the wire next
#[derive(Debug, Default)]
pub struct Outgoing {
    pub envelopes: Vec<Envelope>,
    pub close: Option<CloseCode>,
    pub finished: bool,
}

pub struct Session {
    id: SessionId,
    connection_id: ConnectionId,
    identity: Identity,
    encoding: Encoding,
    version: ProtocolVersion,
    capabilities: Capabilities,
    pub(crate) subscriptions: Mutex<SubscriptionSet>,
    outbound: OutboundQueue,
    /// Last sequence number handed to the writer
    sequence: AtomicU64,
    last_contact: Mutex<Instant>,
    created_at: DateTime<Utc>,
}

impl Session {
    pub(crate) fn new(
        id: SessionId,
        connection_id: ConnectionId,
        identity: Identity,
        encoding: Encoding,
        version: ProtocolVersion,
        capabilities: Capabilities,
        outbound: OutboundConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            connection_id,
            identity,
            encoding,
            version,
            capabilities,
            subscriptions: Mutex::new(SubscriptionSet::default()),
            outbound: OutboundQueue::new(outbound),
            sequence: AtomicU64::new(0),
            last_contact: Mutex::new(Instant::now()),
            created_at: Utc::now(),
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn user_id(&self) -> Snowflake {
        self.identity.user_id
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Filter for `scope`, if subscribed
    pub fn subscription(&self, scope: &Scope) -> Option<EventKinds> {
        self.subscriptions.lock().scopes.get(scope).copied()
    }

    pub fn subscriptions(&self) -> Vec<(Scope, EventKinds)> {
        self.subscriptions
            .lock()
            .scopes
            .iter()
            .map(|(scope, kinds)| (*scope, *kinds))
            .collect()
    }

    /// Whether this session should receive `event`
    pub fn wants(&self, event: &DomainEvent) -> bool {
        let kind = event.kind();
        if !self.capabilities.allows(kind) {
            return false;
        }

        let subs = self.subscriptions.lock();
        !subs.released
            && event
                .scopes()
                .iter()
                .any(|scope| subs.scopes.get(scope).is_some_and(|f| f.admits(kind)))
    }

    /// Queue a payload for the writer
    pub fn enqueue(&self, payload: Arc<Payload>) -> PushOutcome {
        self.outbound.push(payload)
    }

    /// Queue a control reply
    pub fn reply(&self, payload: Payload) -> PushOutcome {
        let outcome = self.outbound.push(Arc::new(payload));
        if outcome == PushOutcome::Overflowed {
            tracing::warn!(
                session_id = %self.id,
                queued = self.queued(),
                "Control replies backed up, closing session"
            );
        }
        outcome
    }

    /// Send `code` once the queue ahead of it is flushed
    pub fn close_with(&self, code: CloseCode) -> bool {
        self.outbound.close(code)
    }

    pub fn is_closing(&self) -> bool {
        self.outbound.is_closing()
    }

    pub(crate) fn shutdown(&self) {
        self.outbound.shutdown();
    }

    pub fn queued(&self) -> usize {
        self.outbound.len()
    }

    /// Wait for outbound work and stamp sequence numbers
    ///
    /// Only the writer task calls this, so numbering follows wire order.
    pub async fn next_outgoing(&self) -> Outgoing {
        let batch = self.outbound.next_batch().await;
        self.stamp(batch)
    }

    fn stamp(&self, batch: Batch) -> Outgoing {
        if batch.finished {
            return Outgoing {
                finished: true,
                ..Outgoing::default()
            };
        }

        let mut envelopes = Vec::with_capacity(batch.items.len() + 1);
        if batch.missed > 0 {
            envelopes.push(Envelope::sequenced(
                self.next_sequence(),
                Payload::EventsMissed(EventsMissedEvent {
                    count: batch.missed,
                }),
            ));
        }

        for payload in batch.items {
            let payload = Arc::unwrap_or_clone(payload);
            let envelope = if payload.is_sequenced() {
                Envelope::sequenced(self.next_sequence(), payload)
            } else {
                Envelope::unsequenced(payload)
            };
            envelopes.push(envelope);
        }

        Outgoing {
            envelopes,
            close: batch.close,
            finished: false,
        }
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Last sequence number handed to the transport
    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    /// Record inbound traffic
    pub fn touch(&self) {
        *self.last_contact.lock() = Instant::now();
    }

    pub fn last_contact(&self) -> Instant {
        *self.last_contact.lock()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("connection_id", &self.connection_id)
            .field("user_id", &self.identity.user_id)
            .field("encoding", &self.encoding)
            .field("version", &self.version)
            .field("sequence", &self.last_sequence())
            .finish_non_exhaustive()
    }
}
