//! Time sources for admission decisions.
//!
//! Instants are represented as a [`Duration`] since a clock-specific epoch.
//! Only differences between instants from the same clock are meaningful.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::Result;

/// A source of the current instant.
pub trait Clock: Send + Sync {
    /// Sample the current instant.
    ///
    /// An error means the limiter cannot decide; callers must not treat it
    /// as either admission or rejection.
    fn now(&self) -> Result<Duration>;
}

/// Live monotonic clock measuring time since its own creation.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock whose epoch is the current instant.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Result<Duration> {
        Ok(self.origin.elapsed())
    }
}

/// A clock that only moves when told to.
///
/// Share it behind an `Arc` to drive a limiter deterministically.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    /// Create a clock at instant zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(duration_to_nanos(by), Ordering::SeqCst);
    }

    /// Jump the clock to an absolute instant.
    pub fn set(&self, now: Duration) {
        self.nanos.store(duration_to_nanos(now), Ordering::SeqCst);
    }

    /// The current instant, infallibly.
    pub fn current(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Result<Duration> {
        Ok(self.current())
    }
}

fn duration_to_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
