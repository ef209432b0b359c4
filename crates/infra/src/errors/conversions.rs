//! Conversions from external infrastructure errors into domain errors.

use std::fmt;

use chatlab_core::AuthError;
use chatlab_domain::ChatLabError;
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub ChatLabError);

impl From<InfraError> for ChatLabError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<ChatLabError> for InfraError {
    fn from(value: ChatLabError) -> Self {
        InfraError(value)
    }
}

impl fmt::Display for InfraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for InfraError {}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoChatLabError {
    fn into_chatlab(self) -> ChatLabError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → ChatLabError */
/* -------------------------------------------------------------------------- */

fn is_connectivity(err: &HttpError) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

impl IntoChatLabError for HttpError {
    fn into_chatlab(self) -> ChatLabError {
        if is_connectivity(&self) {
            ChatLabError::Network(format!("http request failed: {self}"))
        } else if self.is_builder() {
            ChatLabError::Config(format!("invalid http request: {self}"))
        } else if self.is_decode() {
            ChatLabError::InvalidInput(format!("malformed http response: {self}"))
        } else {
            ChatLabError::Network(format!("http error: {self}"))
        }
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_chatlab())
    }
}

/// Place a transport failure in the auth taxonomy
///
/// Timeouts and connection failures become `AuthError::Network`, the only
/// class that allows the direct-provider fallback. An unreadable body from
/// a reachable server becomes `RefreshFailed`.
#[must_use]
pub fn auth_error_from_http(err: &HttpError) -> AuthError {
    if is_connectivity(err) {
        AuthError::Network(err.to_string())
    } else if err.is_builder() {
        AuthError::Config(format!("invalid http request: {err}"))
    } else if err.is_decode() {
        AuthError::RefreshFailed(format!("malformed token response: {err}"))
    } else {
        AuthError::Network(err.to_string())
    }
}

/* -------------------------------------------------------------------------- */
/* std::io::Error → ChatLabError */
/* -------------------------------------------------------------------------- */

impl IntoChatLabError for std::io::Error {
    fn into_chatlab(self) -> ChatLabError {
        match self.kind() {
            std::io::ErrorKind::NotFound => ChatLabError::NotFound(self.to_string()),
            std::io::ErrorKind::PermissionDenied => {
                ChatLabError::Storage(format!("permission denied: {self}"))
            }
            _ => ChatLabError::Storage(format!("io error: {self}")),
        }
    }
}

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        InfraError(value.into_chatlab())
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json / toml → ChatLabError */
/* -------------------------------------------------------------------------- */

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(ChatLabError::InvalidInput(format!("invalid JSON: {value}")))
    }
}

impl From<toml::de::Error> for InfraError {
    fn from(value: toml::de::Error) -> Self {
        InfraError(ChatLabError::Config(format!("Invalid TOML format: {value}")))
    }
}
