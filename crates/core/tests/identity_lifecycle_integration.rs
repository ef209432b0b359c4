//! Integration tests for the vault identity token lifecycle

mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chatlab_core::{AccessTokenProvider, AuthError, EnsureTokenOptions};
use chatlab_domain::TokenGrant;
use support::{backend_error, clock, identity_lifecycle, network_error, MockIdentityBackend};

#[tokio::test(start_paused = true)]
async fn test_load_without_session() {
    let backend = Arc::new(MockIdentityBackend::signed_out());
    let identity = identity_lifecycle(backend.clone(), clock());

    assert!(!identity.load().await.unwrap());
    assert!(!identity.is_authenticated());
    assert_eq!(backend.refresh_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_fresh_token_needs_no_refresh() {
    let backend = Arc::new(MockIdentityBackend::signed_in());
    let identity = identity_lifecycle(backend.clone(), clock());

    assert!(identity.load().await.unwrap());
    let token = identity.ensure_access_token(EnsureTokenOptions::default()).await.unwrap();

    assert_eq!(token, "identity-1");
    assert_eq!(backend.refresh_calls(), 0);
    let next = identity.next_refresh_in().unwrap();
    assert!(next.abs_diff(Duration::from_secs(50 * 60)) <= Duration::from_secs(1));
}

/// Validates `IdentityTokenLifecycle::ensure_access_token` behavior for the
/// rejected session scenario.
///
/// Assertions:
/// - Confirms a 401 is reported as `AuthenticationRequired`.
/// - Confirms the refresh endpoint is called once, without retries.
/// - Confirms the cached token is cleared.
#[tokio::test(start_paused = true)]
async fn test_401_clears_cache_without_retry() {
    let backend = Arc::new(MockIdentityBackend::signed_in());
    let identity = identity_lifecycle(backend.clone(), clock());
    identity.load().await.unwrap();
    backend.refresh.set(Err(backend_error(401)));

    let err = identity.ensure_access_token(EnsureTokenOptions::forced()).await.unwrap_err();

    assert!(matches!(err, AuthError::AuthenticationRequired(_)));
    assert_eq!(backend.refresh_calls(), 1);
    assert!(identity.current().is_none());
    assert!(identity.next_refresh_in().is_none());
}

/// Validates the retry schedule for server errors.
///
/// Assertions:
/// - Confirms two 503s are retried and the third attempt succeeds.
/// - Confirms the pauses are 300 ms then 600 ms.
#[tokio::test(start_paused = true)]
async fn test_5xx_retried_with_linear_backoff() {
    let backend = Arc::new(MockIdentityBackend::signed_in());
    let identity = identity_lifecycle(backend.clone(), clock());
    identity.load().await.unwrap();
    backend.refresh.push(Err(backend_error(503)));
    backend.refresh.push(Err(backend_error(502)));
    backend.refresh.set(Ok(TokenGrant::new("identity-3", 3600)));

    let started = tokio::time::Instant::now();
    let token = identity.ensure_access_token(EnsureTokenOptions::forced()).await.unwrap();

    assert_eq!(token, "identity-3");
    assert_eq!(backend.refresh_calls(), 3);
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(900) && waited < Duration::from_secs(1), "{waited:?}");
}

#[tokio::test(start_paused = true)]
async fn test_attempt_budget_exhausted_keeps_cache() {
    let backend = Arc::new(MockIdentityBackend::signed_in());
    let identity = identity_lifecycle(backend.clone(), clock());
    identity.load().await.unwrap();
    backend.refresh.set(Err(network_error()));

    let err = identity.ensure_access_token(EnsureTokenOptions::forced()).await.unwrap_err();

    assert!(err.is_connectivity());
    assert_eq!(backend.refresh_calls(), 3);
    assert!(identity.current().is_some(), "transient failures keep the token");
}

#[tokio::test(start_paused = true)]
async fn test_max_attempts_override() {
    let backend = Arc::new(MockIdentityBackend::signed_in());
    let identity = identity_lifecycle(backend.clone(), clock());
    backend.refresh.set(Err(backend_error(500)));

    let options = EnsureTokenOptions { max_attempts: Some(1), ..EnsureTokenOptions::forced() };
    let err = identity.ensure_access_token(options).await.unwrap_err();

    assert_eq!(err.status_code(), Some(500));
    assert_eq!(backend.refresh_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_refresh_times_out() {
    let backend = Arc::new(MockIdentityBackend::signed_in());
    *backend.delay.lock() = Duration::from_secs(30);
    let identity = identity_lifecycle(backend.clone(), clock());

    let options = EnsureTokenOptions {
        timeout: Some(Duration::from_secs(1)),
        ..EnsureTokenOptions::forced()
    };
    let err = identity.ensure_access_token(options).await.unwrap_err();

    assert_eq!(err, AuthError::TokenAcquisitionTimeout(Duration::from_secs(1)));
}

/// Validates `IdentityTokenLifecycle::ensure_access_token` behavior after a
/// timed-out wait.
///
/// Assertions:
/// - Confirms the refresh keeps running once the caller gives up.
/// - Confirms its token is cached and served without another refresh.
#[tokio::test(start_paused = true)]
async fn test_timed_out_refresh_settles_in_background() {
    let backend = Arc::new(MockIdentityBackend::signed_in());
    *backend.delay.lock() = Duration::from_secs(30);
    let identity = identity_lifecycle(backend.clone(), clock());

    let options = EnsureTokenOptions {
        timeout: Some(Duration::from_secs(1)),
        ..EnsureTokenOptions::forced()
    };
    let err = identity.ensure_access_token(options).await.unwrap_err();
    assert_eq!(err, AuthError::TokenAcquisitionTimeout(Duration::from_secs(1)));

    tokio::time::sleep(Duration::from_secs(31)).await;

    assert_eq!(identity.current().unwrap().access_token, "identity-2");
    let token = identity.ensure_access_token(EnsureTokenOptions::default()).await.unwrap();
    assert_eq!(token, "identity-2");
    assert_eq!(backend.refresh_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_share_one_refresh() {
    let backend = Arc::new(MockIdentityBackend::signed_out());
    backend.refresh.set(Ok(TokenGrant::new("identity-2", 3600)));
    *backend.delay.lock() = Duration::from_millis(200);
    let identity = identity_lifecycle(backend.clone(), clock());

    let mut callers = Vec::new();
    for _ in 0..5 {
        let identity = identity.clone();
        callers.push(tokio::spawn(async move { identity.access_token().await }));
    }
    for caller in callers {
        assert_eq!(caller.await.unwrap().unwrap(), "identity-2");
    }
    assert_eq!(backend.refresh_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_set_tokens_and_clear() {
    let backend = Arc::new(MockIdentityBackend::signed_out());
    let identity = identity_lifecycle(backend.clone(), clock());

    identity.set_tokens(TokenGrant::new("vault-login", 3600)).await.unwrap();
    assert_eq!(identity.current().unwrap().access_token, "vault-login");
    assert!(backend.tokens.lock().is_some());

    identity.clear().await.unwrap();
    assert!(identity.current().is_none());
    assert!(identity.next_refresh_in().is_none());
    assert_eq!(backend.clear_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_proactive_refresh_keeps_session_alive() {
    let backend = Arc::new(MockIdentityBackend::signed_in());
    // Keeps the validation tick and the proactive timer on the same flight
    *backend.delay.lock() = Duration::from_millis(100);
    let identity = identity_lifecycle(backend.clone(), clock());
    identity.load().await.unwrap();

    tokio::time::sleep(Duration::from_secs(50 * 60 + 1)).await;

    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(identity.current().unwrap().access_token, "identity-2");
}
