//! Authentication error taxonomy
//!
//! | Variant | Class | Clears credential | Retryable |
//! |---------|-------|-------------------|-----------|
//! | `AuthenticationRequired` | fatal to session | yes | no |
//! | `InvalidState`, `InsufficientScopes` | fatal to attempt | no | no (restart the flow) |
//! | `TokenAcquisitionTimeout` | timeout | no | yes |
//! | `Network`, `RefreshFailed` | transient | no | yes |
//! | `Backend` | backend 4xx/5xx | no | 5xx and 429 only |
//! | `Config`, `Storage` | local | no | no |

use std::time::Duration;

use chatlab_common::error::{ErrorClassification, ErrorSeverity};
use chatlab_domain::ChatLabError;
use thiserror::Error;

/// Errors raised by the token lifecycles and the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Refresh token rejected by the provider or identity refresh returned 401
    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),

    /// Callback `state` missing or not matching the pending authorization
    #[error("Invalid OAuth state: {0}")]
    InvalidState(String),

    #[error("Insufficient scopes: granted {granted:?}, required {required:?}")]
    InsufficientScopes { granted: Vec<String>, required: Vec<String> },

    #[error("Timed out after {0:?} waiting for an access token")]
    TokenAcquisitionTimeout(Duration),

    /// Connectivity-class failure (timeout, connection refused, reset)
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response from a backend or provider endpoint
    #[error("Backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// What the UI should prompt the user to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    /// Sign in again / reconnect the account
    Reconnect,
    /// Re-consent with the missing permissions
    GrantPermissions,
    /// Nothing to do now; try again shortly
    RetryLater,
}

impl AuthError {
    /// Whether the session is gone and the credential must be discarded
    #[must_use]
    pub fn is_fatal_to_session(&self) -> bool {
        matches!(self, Self::AuthenticationRequired(_))
    }

    /// Whether the in-progress authorization flow must restart from scratch
    #[must_use]
    pub fn is_fatal_to_attempt(&self) -> bool {
        matches!(self, Self::InvalidState(_) | Self::InsufficientScopes { .. })
    }

    /// Whether this is a connectivity failure, the only trigger for the
    /// direct-provider fallback
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Backend { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn user_action(&self) -> UserAction {
        match self {
            Self::AuthenticationRequired(_) | Self::InvalidState(_) => UserAction::Reconnect,
            Self::InsufficientScopes { .. } => UserAction::GrantPermissions,
            Self::Backend { status: 401, .. } => UserAction::Reconnect,
            _ => UserAction::RetryLater,
        }
    }
}

impl ErrorClassification for AuthError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::TokenAcquisitionTimeout(_) | Self::Network(_) | Self::RefreshFailed(_) => true,
            Self::Backend { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::TokenAcquisitionTimeout(_) | Self::Network(_) | Self::RefreshFailed(_) => {
                ErrorSeverity::Warning
            }
            Self::Backend { status, .. } if *status >= 500 => ErrorSeverity::Warning,
            Self::Storage(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::TokenAcquisitionTimeout(_) => Some(Duration::from_secs(1)),
            Self::Backend { status: 429, .. } => Some(Duration::from_secs(5)),
            _ => None,
        }
    }
}

impl From<AuthError> for ChatLabError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Network(msg) => Self::Network(msg),
            AuthError::Config(msg) => Self::Config(msg),
            AuthError::Storage(msg) => Self::Storage(msg),
            other => Self::Auth(other.to_string()),
        }
    }
}

impl From<ChatLabError> for AuthError {
    fn from(err: ChatLabError) -> Self {
        match err {
            ChatLabError::Network(msg) => Self::Network(msg),
            ChatLabError::Config(msg) => Self::Config(msg),
            ChatLabError::Auth(msg) => Self::AuthenticationRequired(msg),
            other => Self::Storage(other.to_string()),
        }
    }
}
