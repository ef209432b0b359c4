//! Sync error types

use std::time::Duration;

use chatlab_common::error::{ErrorClassification, ErrorSeverity};
use chatlab_domain::ChatLabError;
use thiserror::Error;

use crate::auth::AuthError;

/// Errors raised by a sync run
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// No usable Google access token
    #[error("Sync requires authentication: {0}")]
    Auth(#[from] AuthError),

    /// Remote object store failure
    #[error("Remote storage error: {0}")]
    Remote(String),

    /// Local database failure
    #[error("Local database error: {0}")]
    Local(String),

    /// Persisted client state failure
    #[error("Storage error: {0}")]
    Storage(String),
}

impl SyncError {
    pub(crate) fn remote(err: ChatLabError) -> Self {
        Self::Remote(err.to_string())
    }

    pub(crate) fn local(err: ChatLabError) -> Self {
        Self::Local(err.to_string())
    }

    pub(crate) fn storage(err: ChatLabError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl ErrorClassification for SyncError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Auth(err) => err.is_retryable(),
            Self::Remote(_) => true,
            Self::Local(_) | Self::Storage(_) => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Auth(err) => err.severity(),
            Self::Remote(_) => ErrorSeverity::Warning,
            Self::Local(_) => ErrorSeverity::Error,
            Self::Storage(_) => ErrorSeverity::Critical,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Auth(err) => err.retry_after(),
            _ => None,
        }
    }
}

impl From<SyncError> for ChatLabError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Auth(auth) => auth.into(),
            SyncError::Storage(msg) => Self::Storage(msg),
            other => Self::Sync(other.to_string()),
        }
    }
}
