//! Sliding window log: an exact record of admissions in the trailing window.

use std::collections::VecDeque;
use std::time::Duration;

use super::rules::{Rule, StrategyKind};
use super::strategy::AdmissionStrategy;

/// Keeps the instant of every admitted request still inside the window.
///
/// Exact, at the cost of up to `capacity` stored instants per client.
/// The log stays sorted even when `now` goes backwards between calls, so
/// pruning from the front always removes every expired instant.
#[derive(Debug, Clone)]
pub struct SlidingWindowLog {
    capacity: usize,
    window: Duration,
    /// Admission instants, oldest first
    log: VecDeque<Duration>,
}

impl SlidingWindowLog {
    /// Create an empty log.
    pub fn new(rule: Rule) -> Self {
        let capacity = usize::try_from(rule.capacity()).unwrap_or(usize::MAX);
        Self {
            capacity,
            window: rule.window(),
            log: VecDeque::new(),
        }
    }

    /// Number of admissions currently retained.
    pub fn log_len(&self) -> usize {
        self.log.len()
    }

    fn is_live(window_start: Option<Duration>, at: Duration) -> bool {
        // Before the first full window has elapsed nothing can have expired.
        window_start.map_or(true, |start| at > start)
    }

    fn prune(&mut self, now: Duration) {
        let window_start = now.checked_sub(self.window);
        while let Some(&oldest) = self.log.front() {
            if Self::is_live(window_start, oldest) {
                break;
            }
            self.log.pop_front();
        }
    }
}

impl AdmissionStrategy for SlidingWindowLog {
    fn allow_request(&mut self, now: Duration) -> bool {
        self.prune(now);

        if self.log.len() < self.capacity {
            // Usually the back; an earlier `now` is inserted in order.
            let at = self.log.partition_point(|&logged| logged <= now);
            self.log.insert(at, now);
            true
        } else {
            false
        }
    }

    fn remaining(&self, now: Duration) -> u64 {
        let window_start = now.checked_sub(self.window);
        let live = self
            .log
            .iter()
            .filter(|&&at| Self::is_live(window_start, at))
            .count();
        self.capacity.saturating_sub(live) as u64
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::SlidingWindow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn log(capacity: u64, window_ms: u64) -> SlidingWindowLog {
        SlidingWindowLog::new(Rule::new(capacity, Duration::from_millis(window_ms)).unwrap())
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_log_rejects_at_capacity_then_recovers() {
        let mut log = log(3, 5000);

        assert!(log.allow_request(ms(0)));
        assert!(log.allow_request(ms(0)));
        assert!(log.allow_request(ms(0)));
        assert!(!log.allow_request(ms(0)));
        assert_eq!(log.log_len(), 3);

        // Exactly one window later the first admissions are at the boundary and expire
        assert!(log.allow_request(ms(5000)));
        assert_eq!(log.log_len(), 1);
    }

    #[test]
    fn test_entry_inside_window_still_counts() {
        let mut log = log(2, 1000);
        assert!(log.allow_request(ms(0)));
        assert!(log.allow_request(ms(500)));

        // 0 is still inside (999 - 1000, 999]
        assert!(!log.allow_request(ms(999)));
        // 0 is now at the boundary and drops out, 500 remains
        assert!(log.allow_request(ms(1000)));
        assert!(!log.allow_request(ms(1400)));
        assert_eq!(log.log, [ms(500), ms(1000)]);
    }

    #[test]
    fn test_rejection_does_not_append() {
        let mut log = log(1, 1000);
        assert!(log.allow_request(ms(10)));
        for at in [20, 30, 40] {
            assert!(!log.allow_request(ms(at)));
        }
        assert_eq!(log.log_len(), 1);
        // Only the admitted instant matters for expiry
        assert!(log.allow_request(ms(1010)));
    }

    #[test]
    fn test_remaining_ignores_expired_entries() {
        let mut log = log(3, 1000);
        log.allow_request(ms(0));
        log.allow_request(ms(600));
        assert_eq!(log.remaining(ms(700)), 1);
        assert_eq!(log.remaining(ms(1000)), 2);
        assert_eq!(log.remaining(ms(2000)), 3);
        // remaining does not prune
        assert_eq!(log.log_len(), 2);
    }

    #[test]
    fn test_no_trailing_window_exceeds_capacity() {
        let capacity = 4u64;
        let window = 1000u64;
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..20 {
            let mut log = log(capacity, window);
            let mut now = 0u64;
            let mut admitted = Vec::new();
            for _ in 0..300 {
                now += rng.gen_range(0..150u64);
                if log.allow_request(ms(now)) {
                    admitted.push(now);
                }
                assert!(log.log_len() as u64 <= capacity);
            }

            // Any window (end - window, end] ending on an admission holds at most `capacity`
            for &end in &admitted {
                let in_window = admitted
                    .iter()
                    .filter(|&&t| t + window > end && t <= end)
                    .count() as u64;
                assert!(
                    in_window <= capacity,
                    "{in_window} admissions in window ending at {end}"
                );
            }
        }
    }

    #[test]
    fn test_earlier_instant_is_logged_in_order() {
        let mut log = log(2, 1000);
        assert!(log.allow_request(ms(100)));
        // A caller that sampled its clock earlier arrives second
        assert!(log.allow_request(ms(50)));
        assert_eq!(log.log, [ms(50), ms(100)]);

        // Only 100 lies in (80, 1080]; 50 must not linger behind it
        assert!(log.allow_request(ms(1080)));
        assert_eq!(log.log, [ms(100), ms(1080)]);
    }

    #[test]
    fn test_shuffled_instants_never_exceed_capacity() {
        let capacity = 3u64;
        let window = 1000u64;
        let mut rng = StdRng::seed_from_u64(11);
        let mut log = log(capacity, window);
        let mut now = 0u64;

        for _ in 0..500 {
            now += rng.gen_range(0..100u64);
            let jitter = rng.gen_range(0..50u64).min(now);
            log.allow_request(ms(now - jitter));

            assert!(log.log_len() as u64 <= capacity);
            assert!(log.log.iter().zip(log.log.iter().skip(1)).all(|(a, b)| a <= b));
        }
    }
}
