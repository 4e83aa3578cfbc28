//! Rate limiting algorithms, per-client state and request routing.

mod clock;
mod fixed_window;
mod limiter;
mod registry;
mod rules;
mod sliding_window;
mod strategy;
mod token_bucket;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use fixed_window::FixedWindowCounter;
pub use limiter::RateLimiter;
pub use registry::{ClientRegistry, ClientState};
pub use rules::{Rule, StrategyKind, TimeUnit};
pub use sliding_window::SlidingWindowLog;
pub use strategy::{AdmissionStrategy, StrategyFactory};
pub use token_bucket::TokenBucket;
