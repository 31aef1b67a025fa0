//! Error types for vitalink-core.
//!
//! Nothing in the monitoring core is fatal to the process. Transport
//! errors are recovered by the monitoring loop's backoff-and-continue
//! policy, persistence errors are logged without blocking subsequent
//! iterations, and a missing threshold simply skips evaluation for that
//! parameter.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in the monitoring core.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Device transport error (scan, connect, or read failure).
    #[error("transport error: {0}")]
    Transport(String),

    /// Operation timed out.
    #[error("operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// Measurement store error.
    #[error("measurement store error: {0}")]
    Store(String),

    /// Notification sink error.
    #[error("notification sink error: {0}")]
    Sink(String),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Alert history serialization error.
    #[error("history serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid type construction (e.g. inverted threshold bounds).
    #[error(transparent)]
    Type(#[from] vitalink_types::TypeError),
}

impl Error {
    /// Create a transport error from any displayable cause.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a measurement store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Create a notification sink error.
    pub fn sink(message: impl Into<String>) -> Self {
        Self::Sink(message.into())
    }
}

/// Result type alias using vitalink-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::transport("scan failed");
        assert_eq!(err.to_string(), "transport error: scan failed");

        let err = Error::store("disk full");
        assert_eq!(err.to_string(), "measurement store error: disk full");

        let err = Error::timeout("latest_readings", Duration::from_secs(10));
        assert!(err.to_string().contains("latest_readings"));
        assert!(err.to_string().contains("10s"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }
}
