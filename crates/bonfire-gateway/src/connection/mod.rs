//! Connection and session management
//!
//! Transport metadata, authenticated sessions, their outbound queues, and
//! the registry that owns them.

mod connection;
mod manager;
mod outbound;
mod session;

pub use connection::{Connection, ConnectionId};
pub use manager::SessionManager;
pub use outbound::{BackpressurePolicy, Batch, OutboundConfig, OutboundQueue, PushOutcome};
pub use session::{Outgoing, Session, SessionId};
