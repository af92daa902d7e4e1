//! Event router
//!
//! Fan-out: domain events go to every session subscribed to a matching
//! scope. Fan-in: client commands go to the command collaborator, and the
//! events it returns are published afterwards.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bonfire_core::{DomainError, DomainEvent, Scope};
use parking_lot::{Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::command::Command;
use super::stats::{RouterStats, RouterStatsSnapshot};
use crate::collaborators::CommandHandler;
use crate::connection::{PushOutcome, Session, SessionManager};
use crate::protocol::payloads::{
    ErrorMessage, HeartbeatAckMessage, SubscribedMessage, UnsubscribedMessage,
};
use crate::protocol::Payload;

/// Publishes to the same scope are serialized on one of these stripes so
/// every subscriber sees them in the same order
const PUBLISH_STRIPES: usize = 64;

pub struct EventRouter {
    sessions: Arc<SessionManager>,
    commands: Arc<dyn CommandHandler>,
    stripes: Box<[Mutex<()>]>,
    stats: RouterStats,
}

impl EventRouter {
    pub fn new(sessions: Arc<SessionManager>, commands: Arc<dyn CommandHandler>) -> Self {
        Self {
            sessions,
            commands,
            stripes: (0..PUBLISH_STRIPES).map(|_| Mutex::new(())).collect(),
            stats: RouterStats::default(),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn stats(&self) -> RouterStatsSnapshot {
        self.stats.snapshot()
    }

    fn stripe_index(scope: &Scope) -> usize {
        let mut hasher = DefaultHasher::new();
        scope.hash(&mut hasher);
        (hasher.finish() % PUBLISH_STRIPES as u64) as usize
    }

    /// Lock the stripes of `scopes` in index order
    fn lock_scopes(&self, scopes: &[Scope]) -> Vec<MutexGuard<'_, ()>> {
        let mut indices: Vec<usize> = scopes.iter().map(Self::stripe_index).collect();
        indices.sort_unstable();
        indices.dedup();
        indices.into_iter().map(|i| self.stripes[i].lock()).collect()
    }

    /// Deliver `event` to every interested session
    ///
    /// Never blocks on a slow session. Returns the number of sessions the
    /// event was queued for.
    pub fn publish(&self, event: &DomainEvent) -> usize {
        let scopes = event.scopes();
        let payload = Arc::new(Payload::from(event));

        let _order = self.lock_scopes(&scopes);

        let mut seen = HashSet::new();
        let mut delivered = 0u64;
        let mut dropped = 0u64;

        for scope in &scopes {
            for session in self.sessions.subscribers(scope) {
                if !seen.insert(session.id()) || !session.wants(event) {
                    continue;
                }

                let outcome = session.enqueue(Arc::clone(&payload));
                if outcome.is_queued() {
                    delivered += 1;
                }
                dropped += outcome.dropped();

                if outcome == PushOutcome::Overflowed {
                    self.stats.record_overflow();
                    tracing::warn!(
                        session_id = %session.id(),
                        queued = session.queued(),
                        "Outbound queue overflowed, closing session"
                    );
                }
            }
        }

        self.stats.record_publish(delivered, dropped);
        tracing::trace!(
            event = event.event_type(),
            scope = %event.scope(),
            delivered = delivered,
            "Event published"
        );

        delivered as usize
    }

    /// Run a client command for `session`
    ///
    /// Failures are reported to the session as an error envelope and
    /// returned; they never close the session.
    pub async fn submit(&self, session: &Arc<Session>, command: Command) -> Result<(), DomainError> {
        let name = command.name();
        let result = self.execute(session, command).await;

        self.stats.record_command(result.is_err());
        if let Err(err) = &result {
            self.report_failure(session, name, err);
        }
        result
    }

    async fn execute(&self, session: &Arc<Session>, command: Command) -> Result<(), DomainError> {
        match command {
            Command::Subscribe(sub) => {
                self.commands
                    .authorize_subscription(session.identity(), &sub.scope)
                    .await?;
                self.sessions
                    .subscribe(session.id(), sub.scope, sub.events)
                    .map_err(|e| DomainError::Unavailable(e.to_string()))?;
                session.reply(Payload::Subscribed(SubscribedMessage {
                    scope: sub.scope.to_string(),
                    events: sub.events.bits(),
                }));
            }
            Command::Unsubscribe(scope) => {
                self.sessions
                    .unsubscribe(session.id(), scope)
                    .map_err(|e| DomainError::Unavailable(e.to_string()))?;
                session.reply(Payload::Unsubscribed(UnsubscribedMessage {
                    scope: scope.to_string(),
                }));
            }
            Command::Heartbeat { last_seq } => {
                tracing::trace!(
                    session_id = %session.id(),
                    client_seq = last_seq,
                    server_seq = session.last_sequence(),
                    "Heartbeat"
                );
                session.reply(Payload::HeartbeatAck(HeartbeatAckMessage {
                    last_seq: session.last_sequence(),
                }));
            }
            Command::Domain(cmd) => {
                let events = self.commands.execute(session.identity(), cmd).await?;
                for event in &events {
                    self.publish(event);
                }
            }
        }
        Ok(())
    }

    /// Send an error envelope for a failed command
    pub fn report_failure(&self, session: &Session, command: &str, err: &DomainError) {
        tracing::debug!(
            session_id = %session.id(),
            command = command,
            code = err.code(),
            error = %err,
            "Command failed"
        );

        session.reply(Payload::Error(ErrorMessage {
            code: err.code().to_string(),
            message: err.to_string(),
            command: command.to_string(),
        }));
    }

    /// Publish events arriving from outside the gateway until the sender closes
    pub fn spawn_intake(self: &Arc<Self>, mut events: mpsc::Receiver<DomainEvent>) -> JoinHandle<()> {
        let router = Arc::clone(self);
        tokio::spawn(async move {
            tracing::info!("Event intake started");
            while let Some(event) = events.recv().await {
                router.publish(&event);
            }
            tracing::info!("Event intake stopped");
        })
    }
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("sessions", &self.sessions)
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}
