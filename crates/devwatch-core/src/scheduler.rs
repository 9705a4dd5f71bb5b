//! Broadcast timing.
//!
//! Two deadlines are tracked: a debounce deadline armed by bursts of changes,
//! and a heartbeat deadline that trails the last broadcast. Both share the
//! same `last_broadcast_at` guard. The scheduler never sleeps itself; the
//! owner task waits on [`NotificationScheduler::next_deadline`].

use std::time::Duration;

use tokio::time::Instant;

/// What to do with a change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Broadcast right away.
    Now,
    /// A broadcast is pending at the given instant.
    Deferred(Instant),
}

#[derive(Debug)]
pub struct NotificationScheduler {
    debounce_window: Duration,
    heartbeat_interval: Duration,
    started_at: Instant,
    last_broadcast_at: Option<Instant>,
    pending: Option<Instant>,
}

impl NotificationScheduler {
    pub fn new(debounce_window: Duration, heartbeat_interval: Duration, now: Instant) -> Self {
        Self {
            debounce_window,
            heartbeat_interval,
            started_at: now,
            last_broadcast_at: None,
            pending: None,
        }
    }

    /// Register a registry change made at `now`.
    ///
    /// Outside the debounce window the change is broadcast immediately;
    /// inside it, any pending deadline is replaced by `now + window`.
    pub fn on_change(&mut self, now: Instant) -> Decision {
        let quiet = match self.last_broadcast_at {
            Some(last) => now.saturating_duration_since(last) > self.debounce_window,
            None => true,
        };

        if quiet {
            Decision::Now
        } else {
            let deadline = now + self.debounce_window;
            self.pending = Some(deadline);
            Decision::Deferred(deadline)
        }
    }

    /// Record that a broadcast went out at `now`. Clears any pending deadline.
    pub fn mark_broadcast(&mut self, now: Instant) {
        self.last_broadcast_at = Some(now);
        self.pending = None;
    }

    pub fn last_broadcast_at(&self) -> Option<Instant> {
        self.last_broadcast_at
    }

    pub fn pending_deadline(&self) -> Option<Instant> {
        self.pending
    }

    pub fn heartbeat_deadline(&self) -> Instant {
        self.last_broadcast_at.unwrap_or(self.started_at) + self.heartbeat_interval
    }

    /// The earliest instant at which [`is_due`](Self::is_due) can become true.
    pub fn next_deadline(&self) -> Instant {
        let heartbeat = self.heartbeat_deadline();
        match self.pending {
            Some(pending) => pending.min(heartbeat),
            None => heartbeat,
        }
    }

    /// Whether a debounced or heartbeat broadcast should fire at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        if let Some(pending) = self.pending {
            if now >= pending {
                return true;
            }
        }
        now >= self.heartbeat_deadline()
    }
}
