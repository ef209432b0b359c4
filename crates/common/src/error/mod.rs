//! Error classification shared by every Chat Lab error type
//!
//! Each layer keeps its own `thiserror` enum (`AuthError`, `SyncError`,
//! `ChatLabError`, ...) but all of them implement [`ErrorClassification`] so
//! retry loops and logging can make decisions without matching on concrete
//! variants.
//!
//! ## ErrorClassification Trait
//!
//! - **`is_retryable()`**: Can this operation be retried?
//! - **`severity()`**: How serious is this error? (Info/Warning/Error/Critical)
//! - **`is_critical()`**: Does this require immediate attention?
//! - **`retry_after()`**: Suggested retry delay (if applicable)
//!
//! ## ErrorSeverity Levels
//!
//! | Level | Use Case | Examples |
//! |-------|----------|----------|
//! | **Info** | Informational, expected conditions | No stored tokens, nothing to sync |
//! | **Warning** | Degraded but operational | Transient network failure, token wait timeout |
//! | **Error** | Failure requiring attention | Revoked session, missing scopes, bad config |
//! | **Critical** | System integrity at risk | Corrupted persisted state |
//!
//! ## Example
//!
//! ```rust,ignore
//! #[derive(Debug, thiserror::Error)]
//! pub enum UploadError {
//!     #[error("network unavailable: {0}")]
//!     Network(String),
//!     #[error("quota exceeded")]
//!     Quota,
//! }
//!
//! impl ErrorClassification for UploadError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, Self::Network(_))
//!     }
//!     fn severity(&self) -> ErrorSeverity {
//!         match self {
//!             Self::Network(_) => ErrorSeverity::Warning,
//!             Self::Quota => ErrorSeverity::Error,
//!         }
//!     }
//!     fn is_critical(&self) -> bool {
//!         false
//!     }
//!     fn retry_after(&self) -> Option<Duration> {
//!         None
//!     }
//! }
//! ```

use std::fmt;
use std::time::Duration;

/// Standard trait for error classification
///
/// Provides a consistent interface for determining error characteristics
/// across all Chat Lab crates.
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient issues that may succeed if attempted
    /// again, such as network timeouts or temporary backend unavailability.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    ///
    /// Used for logging decisions.
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool;

    /// Get the suggested retry delay if applicable
    ///
    /// Returns `Some(Duration)` when a specific retry delay is recommended,
    /// or `None` if no specific delay is suggested.
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for logging and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl ErrorSeverity {
    /// Whether errors of this severity should be logged at `error` level
    #[must_use]
    pub fn is_at_least_error(self) -> bool {
        self >= Self::Error
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for error classification helpers.
    use super::*;

    #[derive(Debug)]
    struct Flaky;

    impl ErrorClassification for Flaky {
        fn is_retryable(&self) -> bool {
            true
        }

        fn severity(&self) -> ErrorSeverity {
            ErrorSeverity::Warning
        }

        fn is_critical(&self) -> bool {
            false
        }

        fn retry_after(&self) -> Option<Duration> {
            Some(Duration::from_millis(300))
        }
    }

    /// Validates the severity ordering scenario.
    ///
    /// Assertions:
    /// - Ensures `Info < Warning < Error < Critical`.
    /// - Ensures only `Error` and `Critical` count as error-level.
    #[test]
    fn test_severity_ordering() {
        assert!(ErrorSeverity::Info < ErrorSeverity::Warning);
        assert!(ErrorSeverity::Warning < ErrorSeverity::Error);
        assert!(ErrorSeverity::Error < ErrorSeverity::Critical);

        assert!(!ErrorSeverity::Warning.is_at_least_error());
        assert!(ErrorSeverity::Error.is_at_least_error());
        assert!(ErrorSeverity::Critical.is_at_least_error());
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(ErrorSeverity::Warning.to_string(), "WARN");
        assert_eq!(ErrorSeverity::Critical.to_string(), "CRITICAL");
    }

    #[test]
    fn test_trait_object_usage() {
        let err: &dyn ErrorClassification = &Flaky;
        assert!(err.is_retryable());
        assert!(!err.is_critical());
        assert_eq!(err.retry_after(), Some(Duration::from_millis(300)));
    }
}
