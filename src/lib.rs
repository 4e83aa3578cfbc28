//! Turnstile - Per-client Request Admission Control
//!
//! This crate decides, for each request tagged with a client identifier,
//! whether it is admitted or rejected. Every client gets its own state under
//! one shared [`Rule`](ratelimit::Rule), driven by one of three interchangeable
//! algorithms: token bucket, sliding window log, or fixed window counter.
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use turnstile::ratelimit::{ManualClock, RateLimiter, Rule, StrategyKind};
//!
//! let clock = Arc::new(ManualClock::new());
//! let rule = Rule::new(3, Duration::from_millis(5000)).unwrap();
//! let limiter = RateLimiter::with_clock(StrategyKind::FixedWindow, rule, clock.clone());
//!
//! for _ in 0..3 {
//!     assert!(limiter.handle_request("user-1").unwrap());
//! }
//! assert!(!limiter.handle_request("user-1").unwrap());
//! assert!(limiter.handle_request("user-2").unwrap());
//!
//! clock.advance(Duration::from_millis(5000));
//! assert!(limiter.handle_request("user-1").unwrap());
//! ```

pub mod config;
pub mod error;
pub mod ratelimit;
