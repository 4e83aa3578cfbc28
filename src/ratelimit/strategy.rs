//! The admission capability shared by every rate limiting algorithm.

use std::fmt;
use std::time::Duration;

use super::fixed_window::FixedWindowCounter;
use super::rules::{Rule, StrategyKind};
use super::sliding_window::SlidingWindowLog;
use super::token_bucket::TokenBucket;

/// Per-client admission state for one algorithm.
///
/// Implementations hold only their own client's state. Callers serialize
/// access per instance, so `allow_request` takes `&mut self`.
pub trait AdmissionStrategy: Send + fmt::Debug {
    /// Decide whether a request arriving at `now` is admitted.
    ///
    /// An earlier `now` than a previous call must never rewind the state.
    fn allow_request(&mut self, now: Duration) -> bool;

    /// How many requests would be admitted at `now` if no time passed
    /// between them. Does not change state.
    fn remaining(&self, now: Duration) -> u64;

    /// The algorithm family of this instance.
    fn kind(&self) -> StrategyKind;
}

/// Builds a fresh strategy instance from the shared rule and the
/// instant the client was first seen.
pub type StrategyFactory = fn(Rule, Duration) -> Box<dyn AdmissionStrategy>;

impl StrategyKind {
    /// The constructor for this family, resolved once per limiter.
    pub fn factory(&self) -> StrategyFactory {
        match self {
            StrategyKind::TokenBucket => token_bucket,
            StrategyKind::SlidingWindow => sliding_window,
            StrategyKind::FixedWindow => fixed_window,
        }
    }
}

fn token_bucket(rule: Rule, now: Duration) -> Box<dyn AdmissionStrategy> {
    Box::new(TokenBucket::new(rule, now))
}

fn sliding_window(rule: Rule, _now: Duration) -> Box<dyn AdmissionStrategy> {
    Box::new(SlidingWindowLog::new(rule))
}

fn fixed_window(rule: Rule, now: Duration) -> Box<dyn AdmissionStrategy> {
    Box::new(FixedWindowCounter::new(rule, now))
}
