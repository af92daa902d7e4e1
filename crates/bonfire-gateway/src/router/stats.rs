//! Process-wide router counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct RouterStats {
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    overflows: AtomicU64,
    commands: AtomicU64,
    command_failures: AtomicU64,
}

/// Point-in-time copy of [`RouterStats`], reported by `/health`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RouterStatsSnapshot {
    pub published: u64,
    /// Enqueued for a session
    pub delivered: u64,
    /// Evicted or refused under backpressure
    pub dropped: u64,
    /// Sessions closed for backpressure
    pub overflows: u64,
    pub commands: u64,
    pub command_failures: u64,
}

impl RouterStats {
    pub(crate) fn record_publish(&self, delivered: u64, dropped: u64) {
        self.published.fetch_add(1, Ordering::Relaxed);
        self.delivered.fetch_add(delivered, Ordering::Relaxed);
        self.dropped.fetch_add(dropped, Ordering::Relaxed);
    }

    pub(crate) fn record_overflow(&self) {
        self.overflows.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_command(&self, failed: bool) {
        self.commands.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.command_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> RouterStatsSnapshot {
        RouterStatsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            overflows: self.overflows.load(Ordering::Relaxed),
            commands: self.commands.load(Ordering::Relaxed),
            command_failures: self.command_failures.load(Ordering::Relaxed),
        }
    }
}
