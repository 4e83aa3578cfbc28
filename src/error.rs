//! Error types for the Turnstile admission controller.

use thiserror::Error;

/// Main error type for Turnstile operations.
///
/// Admission decisions are never errors: a rejected request is a plain
/// `false`. These variants cover construction and clock failures only.
#[derive(Error, Debug)]
pub enum TurnstileError {
    /// The limiter was asked for an algorithm it does not know
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    /// Capacity or window is zero or negative
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// The time source could not produce an instant
    #[error("Clock error: {0}")]
    Clock(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Turnstile operations.
pub type Result<T> = std::result::Result<T, TurnstileError>;
