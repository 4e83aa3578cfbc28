//! Configuration management for Turnstile.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::error::{Result, TurnstileError};
use crate::ratelimit::{Clock, MonotonicClock, RateLimiter, Rule, StrategyKind, TimeUnit};

/// Main configuration for a Turnstile limiter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnstileConfig {
    /// Rate limiting configuration
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

/// Strategy and rule for one limiter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Strategy tag, e.g. `TOKEN_BUCKET`
    #[serde(default = "default_strategy")]
    pub strategy: String,

    /// Maximum requests per window
    #[serde(default = "default_capacity")]
    pub capacity: i64,

    /// Window length in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: i64,

    /// Unit-based alternative to `capacity`; requires `unit`
    #[serde(default)]
    pub requests_per_unit: Option<u64>,

    /// Unit-based alternative to `window_ms`; requires `requests_per_unit`
    #[serde(default)]
    pub unit: Option<TimeUnit>,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            capacity: default_capacity(),
            window_ms: default_window_ms(),
            requests_per_unit: None,
            unit: None,
        }
    }
}

fn default_strategy() -> String {
    StrategyKind::TokenBucket.to_string()
}

fn default_capacity() -> i64 {
    5
}

fn default_window_ms() -> i64 {
    60_000
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LimiterConfig {
    /// Validate and build the rule this configuration describes.
    pub fn rule(&self) -> Result<Rule> {
        match (self.requests_per_unit, self.unit) {
            (Some(requests), Some(unit)) => Rule::per_unit(requests, unit),
            (None, None) => Rule::from_millis(self.capacity, self.window_ms),
            _ => Err(TurnstileError::Config(
                "requests_per_unit and unit must be set together".to_string(),
            )),
        }
    }

    /// Replace the capacity and/or window with explicit values.
    ///
    /// A unit-based rule is first converted to `capacity`/`window_ms`, so an
    /// override of one field keeps the other from the unit form.
    pub fn override_rule(&mut self, capacity: Option<i64>, window_ms: Option<i64>) {
        if capacity.is_none() && window_ms.is_none() {
            return;
        }

        if let (Some(requests), Some(unit)) = (self.requests_per_unit, self.unit) {
            self.capacity = i64::try_from(requests).unwrap_or(i64::MAX);
            self.window_ms = i64::try_from(unit.duration().as_millis()).unwrap_or(i64::MAX);
        }
        self.requests_per_unit = None;
        self.unit = None;

        if let Some(capacity) = capacity {
            self.capacity = capacity;
        }
        if let Some(window_ms) = window_ms {
            self.window_ms = window_ms;
        }
    }

    /// Parse the configured strategy tag.
    pub fn strategy_kind(&self) -> Result<StrategyKind> {
        self.strategy.parse()
    }
}

impl TurnstileConfig {
    /// Load configuration from a file path.
    ///
    /// Files ending in `.json` are parsed as JSON, anything else as YAML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading limiter configuration");

        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&contents),
            _ => Self::from_yaml(&contents),
        }
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| TurnstileError::Config(format!("Failed to parse YAML config: {}", e)))
    }

    /// Load configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| TurnstileError::Config(format!("Failed to parse JSON config: {}", e)))
    }

    /// Build a limiter on a live monotonic clock.
    pub fn build_limiter(&self) -> Result<RateLimiter> {
        self.build_limiter_with_clock(Arc::new(MonotonicClock::new()))
    }

    /// Build a limiter on the given clock.
    ///
    /// The strategy tag is checked before the rule.
    pub fn build_limiter_with_clock(&self, clock: Arc<dyn Clock>) -> Result<RateLimiter> {
        let kind = self.limiter.strategy_kind()?;
        let rule = self.limiter.rule()?;
        Ok(RateLimiter::with_clock(kind, rule, clock))
    }
}
