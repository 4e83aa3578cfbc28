//! Core rate limiter implementation.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use super::clock::{Clock, MonotonicClock};
use super::registry::ClientRegistry;
use super::rules::{Rule, StrategyKind};
use super::strategy::AdmissionStrategy;
use crate::error::Result;

/// Routes each client's requests to that client's strategy instance.
///
/// The strategy family and rule are fixed at construction; every client of
/// one limiter shares them. This struct is thread-safe and can be shared
/// across threads and tasks behind an `Arc`.
pub struct RateLimiter {
    /// Algorithm used for every client
    kind: StrategyKind,
    /// Capacity and window shared by every client
    rule: Rule,
    /// Per-client strategy state
    registry: ClientRegistry,
    /// Time source for [`RateLimiter::handle_request`]
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a rate limiter from a strategy tag such as `"TOKEN_BUCKET"`.
    ///
    /// Uses a live monotonic clock. Fails with
    /// [`UnknownStrategy`](crate::error::TurnstileError::UnknownStrategy)
    /// if the tag names no known algorithm.
    pub fn new(strategy: &str, rule: Rule) -> Result<Self> {
        let kind = strategy.parse::<StrategyKind>()?;
        Ok(Self::with_clock(kind, rule, Arc::new(MonotonicClock::new())))
    }

    /// Create a rate limiter with an injected time source.
    pub fn with_clock(kind: StrategyKind, rule: Rule, clock: Arc<dyn Clock>) -> Self {
        debug!(
            strategy = %kind,
            capacity = rule.capacity(),
            window = ?rule.window(),
            "Creating rate limiter"
        );
        Self {
            kind,
            rule,
            registry: ClientRegistry::new(kind.factory(), rule),
            clock,
        }
    }

    /// Decide whether a request from `client_id` is admitted right now.
    ///
    /// Returns `Ok(false)` for a rejected request. An error means the clock
    /// could not be read and no decision was made.
    pub fn handle_request(&self, client_id: &str) -> Result<bool> {
        let state = match self.registry.get(client_id) {
            Some(state) => state,
            None => self.registry.get_or_create(client_id, self.clock.now()?),
        };

        let mut strategy = state.lock();
        // Sampled under the client's lock so instants reach the strategy in order.
        let now = self.clock.now()?;
        Ok(self.decide(client_id, &mut **strategy, now))
    }

    /// Decide whether a request from `client_id` arriving at `now` is admitted.
    ///
    /// `now` is measured on the same scale as this limiter's clock.
    pub fn handle_request_at(&self, client_id: &str, now: Duration) -> bool {
        let state = self.registry.get_or_create(client_id, now);
        let mut strategy = state.lock();
        self.decide(client_id, &mut **strategy, now)
    }

    fn decide(
        &self,
        client_id: &str,
        strategy: &mut dyn AdmissionStrategy,
        now: Duration,
    ) -> bool {
        trace!(
            client_id = %client_id,
            strategy = %self.kind,
            "Checking rate limit"
        );

        let allowed = strategy.allow_request(now);
        if !allowed {
            debug!(
                client_id = %client_id,
                "Rate limit exceeded"
            );
        }
        allowed
    }

    /// Requests `client_id` could still make at `now` without waiting.
    ///
    /// Returns `None` for a client that has never been seen.
    pub fn remaining(&self, client_id: &str, now: Duration) -> Option<u64> {
        self.registry
            .get(client_id)
            .map(|state| state.lock().remaining(now))
    }

    /// Sample this limiter's clock.
    pub fn now(&self) -> Result<Duration> {
        self.clock.now()
    }

    /// The algorithm every client of this limiter uses.
    pub fn strategy(&self) -> StrategyKind {
        self.kind
    }

    /// The rule every client of this limiter shares.
    pub fn rule(&self) -> Rule {
        self.rule
    }

    /// Get the number of known clients.
    pub fn client_count(&self) -> usize {
        self.registry.len()
    }

    /// Clear all client state.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.registry.clear();
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("kind", &self.kind)
            .field("rule", &self.rule)
            .field("registry", &self.registry)
            .finish()
    }
}
