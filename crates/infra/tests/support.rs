#![allow(dead_code)]

use std::time::Duration;

use chatlab_domain::{EndpointsConfig, Environment};
use chatlab_infra::http::{GoogleOAuthProvider, HttpClient, HttpIdentityBackend, HttpOAuthBackend};
use serde_json::{json, Value};
use wiremock::MockServer;

/// Single-attempt client with a short timeout and its own cookie jar.
pub fn client() -> HttpClient {
    HttpClient::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("http client should build")
}

/// Endpoints that route every party to `server`.
pub fn endpoints(server: &MockServer) -> EndpointsConfig {
    let base = server.uri();
    EndpointsConfig {
        identity_base_url: format!("{base}/api/v1"),
        oauth_proxy_base_url: format!("{base}/fidu-chat-lab/api"),
        google_token_url: format!("{base}/token"),
        google_revoke_url: format!("{base}/revoke"),
        google_userinfo_url: format!("{base}/userinfo"),
        request_timeout_secs: 5,
    }
}

pub fn identity_backend(server: &MockServer) -> HttpIdentityBackend {
    HttpIdentityBackend::new(client(), &endpoints(server).identity_base_url, Environment::Staging)
        .expect("identity backend should build")
}

pub fn oauth_backend(server: &MockServer) -> HttpOAuthBackend {
    HttpOAuthBackend::new(
        client(),
        &endpoints(server).oauth_proxy_base_url,
        Environment::Staging,
    )
    .expect("oauth backend should build")
}

pub fn google(server: &MockServer) -> GoogleOAuthProvider {
    GoogleOAuthProvider::new(client(), &endpoints(server)).expect("google provider should build")
}

/// Google-style token response body.
pub fn token_body(access_token: &str, refresh_token: Option<&str>) -> Value {
    let mut body = json!({
        "access_token": access_token,
        "expires_in": 3599,
        "scope": "openid https://www.googleapis.com/auth/drive.appdata",
        "token_type": "Bearer",
    });
    if let Some(refresh) = refresh_token {
        body["refresh_token"] = json!(refresh);
    }
    body
}
