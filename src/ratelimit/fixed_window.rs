//! Fixed window counter implementation.

use std::time::Duration;

use super::rules::{Rule, StrategyKind};
use super::strategy::AdmissionStrategy;

/// A counter that tracks admissions within the current window.
///
/// A request arriving after the window has elapsed starts a new window
/// anchored at its own arrival; empty windows in between are skipped.
/// Up to `2 * capacity` requests can be admitted around a boundary.
#[derive(Debug, Clone)]
pub struct FixedWindowCounter {
    /// The limit for this counter
    capacity: u64,
    /// Length of each window
    window: Duration,
    /// When the current window started
    window_start: Duration,
    /// Admissions in the current window
    count: u64,
}

impl FixedWindowCounter {
    /// Create a counter whose first window starts at `now`.
    pub fn new(rule: Rule, now: Duration) -> Self {
        Self {
            capacity: rule.capacity(),
            window: rule.window(),
            window_start: now,
            count: 0,
        }
    }

    /// Get the current count.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// When the current window started.
    pub fn window_start(&self) -> Duration {
        self.window_start
    }

    fn is_expired(&self, now: Duration) -> bool {
        now.saturating_sub(self.window_start) >= self.window
    }

    /// Reset the window if it has expired.
    fn maybe_reset_window(&mut self, now: Duration) {
        if self.is_expired(now) {
            self.window_start = now;
            self.count = 0;
        }
    }
}

impl AdmissionStrategy for FixedWindowCounter {
    fn allow_request(&mut self, now: Duration) -> bool {
        self.maybe_reset_window(now);

        if self.count < self.capacity {
            self.count += 1;
            true
        } else {
            false
        }
    }

    fn remaining(&self, now: Duration) -> u64 {
        if self.is_expired(now) {
            self.capacity
        } else {
            self.capacity.saturating_sub(self.count)
        }
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::FixedWindow
    }
}
