//! Bounded per-session outbound queue
//!
//! Producers (`publish`, command replies) push without blocking; the
//! session's writer task drains. Control payloads are never evicted; they
//! have their own bound, and exceeding it closes the session.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bonfire_common::{GatewaySettings, OverflowPolicy};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::protocol::{CloseCode, Payload};

/// What happens when a push finds the queue full
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackpressurePolicy {
    /// Evict the oldest undelivered dispatch; close once `threshold`
    /// overflows happen within `window`
    DropOldest { threshold: u32, window: Duration },
    /// Close on the first overflow
    Disconnect,
}

/// Queue bound and overflow behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboundConfig {
    /// Queued dispatches
    pub capacity: usize,
    /// Queued control replies
    pub control_capacity: usize,
    pub policy: BackpressurePolicy,
}

impl OutboundConfig {
    pub fn from_settings(settings: &GatewaySettings) -> Self {
        let policy = match settings.overflow_policy {
            OverflowPolicy::DropOldest => BackpressurePolicy::DropOldest {
                threshold: settings.overflow_threshold,
                window: settings.overflow_window(),
            },
            OverflowPolicy::Disconnect => BackpressurePolicy::Disconnect,
        };

        Self {
            capacity: settings.queue_capacity.max(1),
            control_capacity: settings.control_queue_capacity.max(1),
            policy,
        }
    }
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self::from_settings(&GatewaySettings::default())
    }
}

/// Result of a push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Queued after evicting the oldest dispatch
    QueuedAfterDrop,
    /// The overflow closed the session; the new payload was dropped
    Overflowed,
    /// The session is closing or gone
    Closed,
}

impl PushOutcome {
    /// Whether the pushed payload will reach the writer
    pub const fn is_queued(self) -> bool {
        matches!(self, Self::Queued | Self::QueuedAfterDrop)
    }

    /// Number of dispatches this push caused to be lost
    pub const fn dropped(self) -> u64 {
        match self {
            Self::QueuedAfterDrop | Self::Overflowed => 1,
            Self::Queued | Self::Closed => 0,
        }
    }
}

/// Everything the writer should send next
#[derive(Debug, Default)]
pub struct Batch {
    /// Dispatches dropped since the last batch; sent as `events_missed` first
    pub missed: u64,
    pub items: Vec<Arc<Payload>>,
    /// Send this close frame after the items
    pub close: Option<CloseCode>,
    /// The session was destroyed; stop without a close frame of its own
    pub finished: bool,
}

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<Arc<Payload>>,
    /// Dispatches currently in `items`
    dispatches: usize,
    /// Control payloads currently in `items`
    controls: usize,
    missed: u64,
    overflows: VecDeque<Instant>,
    close: Option<CloseCode>,
    /// The close code was handed to the writer
    close_taken: bool,
    shut: bool,
}

impl QueueState {
    fn is_closing(&self) -> bool {
        self.close.is_some() || self.shut
    }

    fn has_work(&self) -> bool {
        !self.items.is_empty()
            || self.missed > 0
            || (self.close.is_some() && !self.close_taken)
            || self.shut
    }
}

#[derive(Debug)]
pub struct OutboundQueue {
    config: OutboundConfig,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl OutboundQueue {
    pub fn new(config: OutboundConfig) -> Self {
        Self {
            config,
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Queued payloads, control included
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closing(&self) -> bool {
        self.state.lock().is_closing()
    }

    /// Push a payload without blocking
    pub fn push(&self, payload: Arc<Payload>) -> PushOutcome {
        let outcome = {
            let mut state = self.state.lock();
            if state.is_closing() {
                return PushOutcome::Closed;
            }

            if payload.is_critical() {
                if state.controls < self.config.control_capacity {
                    state.items.push_back(payload);
                    state.controls += 1;
                    PushOutcome::Queued
                } else {
                    state.close = Some(CloseCode::BackpressureOverflow);
                    PushOutcome::Overflowed
                }
            } else if state.dispatches < self.config.capacity {
                state.items.push_back(payload);
                state.dispatches += 1;
                PushOutcome::Queued
            } else {
                self.overflow(&mut state, payload)
            }
        };

        if outcome != PushOutcome::Closed {
            self.notify.notify_one();
        }
        outcome
    }

    fn overflow(&self, state: &mut QueueState, payload: Arc<Payload>) -> PushOutcome {
        let (threshold, window) = match self.config.policy {
            BackpressurePolicy::Disconnect => {
                state.missed += 1;
                state.close = Some(CloseCode::BackpressureOverflow);
                return PushOutcome::Overflowed;
            }
            BackpressurePolicy::DropOldest { threshold, window } => (threshold, window),
        };

        let now = Instant::now();
        while state
            .overflows
            .front()
            .is_some_and(|at| now.duration_since(*at) > window)
        {
            state.overflows.pop_front();
        }
        state.overflows.push_back(now);

        if state.overflows.len() >= threshold as usize {
            state.missed += 1;
            state.close = Some(CloseCode::BackpressureOverflow);
            return PushOutcome::Overflowed;
        }

        // `dispatches` is at capacity, so a non-critical entry exists
        if let Some(oldest) = state.items.iter().position(|p| !p.is_critical()) {
            state.items.remove(oldest);
        }
        state.items.push_back(payload);
        state.missed += 1;
        PushOutcome::QueuedAfterDrop
    }

    /// Ask the writer to send `code` after what is already queued
    ///
    /// The first close code wins. Returns `false` if the queue was already
    /// closing.
    pub fn close(&self, code: CloseCode) -> bool {
        let accepted = {
            let mut state = self.state.lock();
            if state.is_closing() {
                false
            } else {
                state.close = Some(code);
                true
            }
        };
        self.notify.notify_one();
        accepted
    }

    /// Discard everything and release the writer; used on session teardown
    pub fn shutdown(&self) {
        {
            let mut state = self.state.lock();
            state.shut = true;
            state.items.clear();
            state.dispatches = 0;
            state.controls = 0;
        }
        self.notify.notify_one();
    }

    /// Take everything queued, if anything is
    pub fn try_drain(&self) -> Option<Batch> {
        let mut state = self.state.lock();
        if !state.has_work() {
            return None;
        }

        if state.shut {
            state.items.clear();
            state.dispatches = 0;
            state.controls = 0;
            state.missed = 0;
            return Some(Batch {
                finished: true,
                ..Batch::default()
            });
        }

        let close = match state.close {
            Some(code) if !state.close_taken => {
                state.close_taken = true;
                Some(code)
            }
            _ => None,
        };

        state.dispatches = 0;
        state.controls = 0;
        Some(Batch {
            missed: std::mem::take(&mut state.missed),
            items: state.items.drain(..).collect(),
            close,
            finished: false,
        })
    }

    /// Wait until there is something to send
    pub async fn next_batch(&self) -> Batch {
        loop {
            if let Some(batch) = self.try_drain() {
                return batch;
            }
            self.notify.notified().await;
        }
    }
}
