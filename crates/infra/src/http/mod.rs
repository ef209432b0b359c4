//! HTTP adapters for the three remote auth parties
//!
//! - [`HttpIdentityBackend`]: vault identity backend (`/auth/*`)
//! - [`HttpOAuthBackend`]: Chat Lab backend proxy (`/oauth/*`)
//! - [`GoogleOAuthProvider`]: Google token, revoke and userinfo endpoints
//!
//! Non-2xx responses become `AuthError::Backend { status, .. }`, except that
//! an `invalid_grant` from Google (reported directly or relayed by the proxy)
//! becomes `AuthError::AuthenticationRequired`. Transport failures are
//! classified by [`crate::errors::auth_error_from_http`].

pub mod client;
pub mod google;
pub mod identity;
pub mod oauth_proxy;

pub use client::{HttpClient, HttpClientBuilder};
pub use google::GoogleOAuthProvider;
pub use identity::HttpIdentityBackend;
pub use oauth_proxy::HttpOAuthBackend;

use chatlab_core::AuthError;
use chatlab_domain::ChatLabError;
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::errors::auth_error_from_http;

const MAX_ERROR_MESSAGE_CHARS: usize = 200;

/// Validate `base` and return it without a trailing slash
pub(crate) fn normalize_base_url(base: &str) -> Result<String, ChatLabError> {
    let trimmed = base.trim().trim_end_matches('/');
    Url::parse(trimmed)
        .map_err(|e| ChatLabError::Config(format!("Invalid base URL {trimmed:?}: {e}")))?;
    Ok(trimmed.to_string())
}

/// Decode a 2xx JSON body, or turn any other status into an error
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, AuthError> {
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }
    response.json::<T>().await.map_err(|err| auth_error_from_http(&err))
}

/// Accept any 2xx, discarding the body
pub(crate) async fn expect_success(response: Response) -> Result<(), AuthError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(error_from_response(response).await)
    }
}

/// Error for a non-2xx response, with the body's message when present
pub(crate) async fn error_from_response(response: Response) -> AuthError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    classify_error_body(status, &body)
}

pub(crate) fn classify_error_body(status: u16, body: &str) -> AuthError {
    let message = error_message(body);
    if body.contains("invalid_grant") {
        return AuthError::AuthenticationRequired(message);
    }
    AuthError::Backend { status, message }
}

/// Best human-readable message in an error body
///
/// Understands FastAPI (`detail`), OAuth (`error_description`, `error`) and
/// generic (`message`) shapes; falls back to the raw text.
fn error_message(body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|value| {
        ["detail", "error_description", "error", "message"]
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_str).map(str::to_string))
    });

    let message = from_json.unwrap_or_else(|| body.trim().to_string());
    if message.chars().count() > MAX_ERROR_MESSAGE_CHARS {
        message.chars().take(MAX_ERROR_MESSAGE_CHARS).collect()
    } else {
        message
    }
}
