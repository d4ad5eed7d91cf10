//! Per-target cooldown window.
//!
//! Owned by a single control loop; no locking.

use std::time::{Duration, Instant};

/// Guarantees a minimum interval between two recorded actions.
#[derive(Debug, Clone)]
pub struct CooldownTracker {
    cooldown: Duration,
    last_action: Option<Instant>,
}

impl CooldownTracker {
    /// A tracker with no recorded action; the first check always passes.
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_action: None,
        }
    }

    /// Whether an action taken at `now` would respect the window.
    pub fn is_ready(&self, now: Instant) -> bool {
        match self.last_action {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.cooldown,
        }
    }

    /// Record a successful action at `now`.
    pub fn record(&mut self, now: Instant) {
        self.last_action = Some(now);
    }

    /// Check and record in one step. Returns false without touching state
    /// when still inside the window.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if self.is_ready(now) {
            self.record(now);
            true
        } else {
            false
        }
    }

    /// Time left before the next action is allowed.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last_action {
            None => Duration::ZERO,
            Some(last) => self
                .cooldown
                .saturating_sub(now.saturating_duration_since(last)),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn last_action(&self) -> Option<Instant> {
        self.last_action
    }
}
