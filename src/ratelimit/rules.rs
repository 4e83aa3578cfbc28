//! Rate limit rules and strategy selection.
//!
//! A [`Rule`] is the `(capacity, window)` pair every client of one limiter
//! shares. A [`StrategyKind`] names which algorithm enforces it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, TurnstileError};

/// How many requests are admitted per window.
///
/// Both fields are fixed at construction. `Rule` is `Copy`, so every client
/// strategy holds its own copy of the same values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rule {
    capacity: u64,
    window: Duration,
}

impl Rule {
    /// Create a rule, rejecting a zero capacity or a zero window.
    pub fn new(capacity: u64, window: Duration) -> Result<Self> {
        if capacity == 0 {
            return Err(TurnstileError::InvalidRule(
                "capacity must be greater than 0".to_string(),
            ));
        }
        if window.is_zero() {
            return Err(TurnstileError::InvalidRule(
                "window duration must be greater than 0".to_string(),
            ));
        }
        Ok(Self { capacity, window })
    }

    /// Create a rule from signed request and millisecond counts.
    ///
    /// Negative values are reported as [`TurnstileError::InvalidRule`]
    /// rather than wrapping around.
    pub fn from_millis(max_requests: i64, window_ms: i64) -> Result<Self> {
        let capacity = u64::try_from(max_requests).map_err(|_| {
            TurnstileError::InvalidRule(format!(
                "capacity must be positive, got {}",
                max_requests
            ))
        })?;
        let window_ms = u64::try_from(window_ms).map_err(|_| {
            TurnstileError::InvalidRule(format!(
                "window duration must be positive, got {}ms",
                window_ms
            ))
        })?;
        Self::new(capacity, Duration::from_millis(window_ms))
    }

    /// Create a rule of `requests_per_unit` requests per time unit.
    pub fn per_unit(requests_per_unit: u64, unit: TimeUnit) -> Result<Self> {
        Self::new(requests_per_unit, unit.duration())
    }

    /// Maximum number of admitted requests per window.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// The time span the capacity applies to.
    pub fn window(&self) -> Duration {
        self.window
    }
}

/// Time unit for unit-based rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
}

impl TimeUnit {
    /// Get the duration of this time unit.
    pub fn duration(&self) -> Duration {
        match self {
            TimeUnit::Second => Duration::from_secs(1),
            TimeUnit::Minute => Duration::from_secs(60),
            TimeUnit::Hour => Duration::from_secs(3600),
            TimeUnit::Day => Duration::from_secs(86400),
        }
    }
}

/// The algorithm family a limiter uses for all of its clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyKind {
    /// Continuous refill, bursts up to capacity
    TokenBucket,
    /// Exact log of admissions in the trailing window
    SlidingWindow,
    /// Counter reset at window boundaries
    FixedWindow,
}

impl StrategyKind {
    /// All known strategy families.
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::TokenBucket,
        StrategyKind::SlidingWindow,
        StrategyKind::FixedWindow,
    ];

    /// The canonical tag for this strategy.
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::TokenBucket => "TOKEN_BUCKET",
            StrategyKind::SlidingWindow => "SLIDING_WINDOW",
            StrategyKind::FixedWindow => "FIXED_WINDOW",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = TurnstileError;

    /// Parse a strategy tag. Tags are matched exactly, e.g. `TOKEN_BUCKET`.
    fn from_str(tag: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == tag)
            .ok_or_else(|| TurnstileError::UnknownStrategy(tag.to_string()))
    }
}
