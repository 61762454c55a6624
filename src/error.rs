//! Error types for the catalog rate limiter.

use thiserror::Error;

/// Main error type for rate limiter operations.
///
/// A rejected request is not an error: it is reported through
/// [`Admission`](crate::ratelimit::Admission). Everything here means the
/// check could not be evaluated and the caller must not treat the request
/// as admitted.
#[derive(Error, Debug)]
pub enum LimiterError {
    /// Limiter constructed with a zero capacity or window
    #[error("Invalid limiter configuration: {0}")]
    InvalidConfig(String),

    /// Check called with an unusable argument, such as a zero limit
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration file or policy table errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for rate limiter operations.
pub type Result<T> = std::result::Result<T, LimiterError>;
