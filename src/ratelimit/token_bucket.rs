//! Token bucket with continuous, exact refill.

use std::time::Duration;

use super::rules::{Rule, StrategyKind};
use super::strategy::AdmissionStrategy;

/// A bucket that starts full and refills `capacity` tokens per window.
///
/// The balance is kept in token-nanoseconds (one token is `window` worth of
/// credit), so partial refills between calls accumulate exactly and an empty
/// bucket is full again after exactly one window.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    /// Maximum number of tokens the bucket can hold
    capacity: u64,
    /// Credit per token: the window length in nanoseconds
    token_cost: u128,
    /// Available credit, always within `[0, capacity * token_cost]`
    credit: u128,
    /// Instant of the last refill
    last_refill: Duration,
}

impl TokenBucket {
    /// Create a full bucket whose refill clock starts at `now`.
    pub fn new(rule: Rule, now: Duration) -> Self {
        let token_cost = rule.window().as_nanos();
        Self {
            capacity: rule.capacity(),
            token_cost,
            credit: Self::full(rule.capacity(), token_cost),
            last_refill: now,
        }
    }

    /// Tokens currently in the bucket, as of the last refill.
    pub fn available_tokens(&self) -> f64 {
        self.credit as f64 / self.token_cost as f64
    }

    fn full(capacity: u64, token_cost: u128) -> u128 {
        u128::from(capacity).saturating_mul(token_cost)
    }

    /// Credit the bucket would hold at `now`, before consumption.
    fn credit_at(&self, now: Duration) -> u128 {
        // Each elapsed nanosecond adds `capacity` credit: a full window adds
        // `capacity * token_cost`, i.e. `capacity` tokens.
        let elapsed = now.saturating_sub(self.last_refill).as_nanos();
        let refill = elapsed.saturating_mul(u128::from(self.capacity));
        self.credit
            .saturating_add(refill)
            .min(Self::full(self.capacity, self.token_cost))
    }

    fn refill(&mut self, now: Duration) {
        self.credit = self.credit_at(now);
        // An earlier `now` adds nothing and must not rewind the refill point.
        self.last_refill = self.last_refill.max(now);
    }
}

impl AdmissionStrategy for TokenBucket {
    fn allow_request(&mut self, now: Duration) -> bool {
        self.refill(now);

        if self.credit >= self.token_cost {
            self.credit -= self.token_cost;
            true
        } else {
            false
        }
    }

    fn remaining(&self, now: Duration) -> u64 {
        u64::try_from(self.credit_at(now) / self.token_cost).unwrap_or(self.capacity)
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::TokenBucket
    }
}
