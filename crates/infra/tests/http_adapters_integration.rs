//! Integration tests for the HTTP adapters against a mock server.

mod support;

use chatlab_common::ErrorClassification;
use chatlab_core::{AuthError, ClientCredentials, IdentityBackend, OAuthBackend, OAuthProvider};
use chatlab_domain::TokenGrant;
use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn credentials() -> ClientCredentials {
    ClientCredentials {
        client_id: "client.apps.googleusercontent.com".to_string(),
        client_secret: "shh".to_string(),
    }
}

/// Validates `HttpIdentityBackend::get_tokens` behavior for the
/// signed-in cookie scenario.
///
/// Assertions:
/// - Confirms the environment tag is sent as a query parameter.
/// - Confirms the stored tokens are returned as a grant.
#[tokio::test]
async fn identity_get_tokens_returns_stored_grant() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/auth/get-tokens"))
        .and(query_param("environment", "staging"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "id-token",
            "refresh_token": "id-refresh",
            "expires_in": 900,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let grant = support::identity_backend(&server).get_tokens().await.unwrap().unwrap();

    assert_eq!(grant.access_token, "id-token");
    assert_eq!(grant.refresh_token.as_deref(), Some("id-refresh"));
    assert_eq!(grant.expires_in, 900);
}

/// Validates `HttpIdentityBackend::get_tokens` behavior for the
/// signed-out scenarios.
///
/// Assertions:
/// - Confirms a 401 means no session rather than an error.
/// - Confirms an empty access token means no session.
#[tokio::test]
async fn identity_get_tokens_without_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/auth/get-tokens"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "No cookie"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/auth/get-tokens"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access_token": "", "expires_in": 0})),
        )
        .mount(&server)
        .await;

    let backend = support::identity_backend(&server);
    assert!(backend.get_tokens().await.unwrap().is_none());
    assert!(backend.get_tokens().await.unwrap().is_none());
}

#[tokio::test]
async fn identity_refresh_failure_keeps_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh-access-token"))
        .and(body_json(json!({"environment": "staging"})))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"detail": "Refresh token expired"})),
        )
        .mount(&server)
        .await;

    let err = support::identity_backend(&server).refresh_access_token().await.unwrap_err();

    match err {
        AuthError::Backend { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Refresh token expired");
        }
        other => panic!("expected backend error, got {other:?}"),
    }
}

#[tokio::test]
async fn identity_set_and_clear_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/set-tokens"))
        .and(body_json(json!({
            "access_token": "id-token",
            "refresh_token": "id-refresh",
            "expires_in": 900,
            "environment": "staging",
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/clear-tokens"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let backend = support::identity_backend(&server);
    let grant = TokenGrant::new("id-token", 900).with_refresh_token("id-refresh");
    backend.set_tokens(&grant).await.unwrap();
    backend.clear_tokens().await.unwrap();
}

/// Validates `HttpOAuthBackend::exchange_code` behavior for the proxy
/// exchange scenario.
///
/// Assertions:
/// - Confirms the identity token is sent as a bearer header.
/// - Confirms the body carries code, redirect URI and environment.
#[tokio::test]
async fn proxy_exchange_sends_identity_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fidu-chat-lab/api/oauth/exchange-code"))
        .and(header("authorization", "Bearer id-token"))
        .and(body_json(json!({
            "code": "auth-code",
            "redirect_uri": "http://localhost:3000/oauth-callback",
            "environment": "staging",
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(support::token_body("g-access", None)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let grant = support::oauth_backend(&server)
        .exchange_code("id-token", "auth-code", "http://localhost:3000/oauth-callback")
        .await
        .unwrap();

    assert_eq!(grant.access_token, "g-access");
    assert_eq!(grant.refresh_token, None, "refresh token stays in the proxy cookie");
    assert_eq!(grant.expires_in, 3599);
}

#[tokio::test]
async fn proxy_server_error_is_backend_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fidu-chat-lab/api/oauth/refresh-token"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .expect(1)
        .mount(&server)
        .await;

    let err =
        support::oauth_backend(&server).refresh_token("id-token", Some("r-1")).await.unwrap_err();

    assert!(
        matches!(&err, AuthError::Backend { status: 502, message } if message == "Bad Gateway"),
        "got {err:?}"
    );
    assert!(err.is_retryable());
}

/// Validates `HttpOAuthBackend::refresh_token` behavior for the
/// revoked-grant scenarios.
///
/// Assertions:
/// - Confirms an `invalid_grant` body requires a new sign-in.
/// - Confirms a cookie-only refresh rejected with 400 requires a new sign-in.
#[tokio::test]
async fn proxy_refresh_rejections_require_sign_in() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fidu-chat-lab/api/oauth/refresh-token"))
        .and(body_json(json!({"refresh_token": "revoked", "environment": "staging"})))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "detail": "Token refresh failed: {\"error\": \"invalid_grant\"}",
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/fidu-chat-lab/api/oauth/refresh-token"))
        .and(body_json(json!({"environment": "staging"})))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"detail": "Missing refresh_token"})),
        )
        .mount(&server)
        .await;

    let backend = support::oauth_backend(&server);

    let revoked = backend.refresh_token("id-token", Some("revoked")).await.unwrap_err();
    assert!(matches!(revoked, AuthError::AuthenticationRequired(_)), "got {revoked:?}");

    let missing = backend.refresh_token("id-token", None).await.unwrap_err();
    match missing {
        AuthError::AuthenticationRequired(message) => {
            assert_eq!(message, "Missing refresh_token");
        }
        other => panic!("expected authentication required, got {other:?}"),
    }
}

#[tokio::test]
async fn proxy_cookie_refresh_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fidu-chat-lab/api/oauth/refresh-token"))
        .and(body_json(json!({"environment": "staging"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(support::token_body("g-fresh", None)),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/fidu-chat-lab/api/oauth/logout"))
        .and(header("authorization", "Bearer id-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let backend = support::oauth_backend(&server);
    let grant = backend.refresh_token("id-token", None).await.unwrap();
    assert_eq!(grant.access_token, "g-fresh");
    backend.logout("id-token").await.unwrap();
}

/// Validates `GoogleOAuthProvider` behavior for the direct fallback scenario.
///
/// Assertions:
/// - Confirms code exchange posts the client credentials as a form.
/// - Confirms refresh posts the refresh grant type.
#[tokio::test]
async fn google_token_requests_are_forms() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("client_secret=shh"))
        .and(body_string_contains("code=auth-code"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(support::token_body("g-access", Some("g-refresh"))),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=g-refresh"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(support::token_body("g-fresh", None)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let google = support::google(&server);
    let grant = google
        .exchange_code("auth-code", "http://localhost:3000/oauth-callback", &credentials())
        .await
        .unwrap();
    assert_eq!(grant.refresh_token.as_deref(), Some("g-refresh"));

    let refreshed = google.refresh("g-refresh", &credentials()).await.unwrap();
    assert_eq!(refreshed.access_token, "g-fresh");
}

#[tokio::test]
async fn google_revoke_and_user_info() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/revoke"))
        .and(body_string_contains("token=g-access"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(header("authorization", "Bearer g-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sub": "1234567890",
            "email": "ada@example.com",
            "name": "Ada",
            "picture": "https://example.com/ada.png",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let google = support::google(&server);
    google.revoke("g-access").await.unwrap();
    let profile = google.user_info("g-access").await.unwrap();

    assert_eq!(profile.id, "1234567890");
    assert_eq!(profile.email, "ada@example.com");
}

#[tokio::test]
async fn google_invalid_grant_requires_sign_in() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Token has been expired or revoked.",
        })))
        .mount(&server)
        .await;

    let err = support::google(&server).refresh("old", &credentials()).await.unwrap_err();

    match err {
        AuthError::AuthenticationRequired(message) => {
            assert_eq!(message, "Token has been expired or revoked.");
        }
        other => panic!("expected authentication required, got {other:?}"),
    }
}
