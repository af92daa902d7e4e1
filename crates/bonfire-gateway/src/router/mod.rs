//! Event routing
//!
//! Fans domain events out to subscribed sessions and feeds client commands
//! to the domain.

mod command;
mod event_router;
mod stats;

pub use command::{Command, Subscription};
pub use event_router::EventRouter;
pub use stats::{RouterStats, RouterStatsSnapshot};
