//! Shared test helpers for `chatlab-core` integration tests.
//!
//! Every port gets a scriptable in-memory double that counts its calls, so
//! tests can assert how many network round-trips an operation caused.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chatlab_common::time::{Clock, MockClock};
use chatlab_core::{
    AccessTokenProvider, AuthCoordinator, AuthError, AuthEventKind, ClientCredentials,
    IdentityBackend, IdentityTokenLifecycle, LocalDatabase, OAuthBackend, OAuthPorts,
    OAuthProvider, OAuthTokenLifecycle, RemoteObjectStore, StateStore, SyncError, SyncOperation,
};
use chatlab_domain::constants::KEY_OAUTH_CREDENTIAL;
use chatlab_domain::{
    ChatLabError, Credential, CredentialOrigin, IdentityConfig, OAuthConfig, RemoteObject,
    Result as DomainResult, SyncReport, TokenGrant, UserProfile,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Fixed wall-clock origin for every test clock
pub const EPOCH_MS: i64 = 1_760_000_000_000;

pub const SCOPE_PROFILE: &str = "openid";
pub const SCOPE_DRIVE: &str = "https://www.googleapis.com/auth/drive.appdata";

pub fn clock() -> Arc<MockClock> {
    Arc::new(MockClock::at_epoch_ms(EPOCH_MS))
}

pub fn required_scopes() -> Vec<String> {
    vec![SCOPE_PROFILE.to_string(), SCOPE_DRIVE.to_string()]
}

pub fn oauth_config() -> OAuthConfig {
    OAuthConfig {
        client_id: "client-id".to_string(),
        client_secret: Some("client-secret".to_string()),
        required_scopes: required_scopes(),
        ..OAuthConfig::default()
    }
}

/// Grant carrying every required scope and a refresh token
pub fn full_grant(access_token: &str, expires_in_secs: i64) -> TokenGrant {
    TokenGrant::new(access_token, expires_in_secs)
        .with_refresh_token("refresh-token")
        .with_scope(format!("{SCOPE_PROFILE} {SCOPE_DRIVE}"))
}

pub fn profile() -> UserProfile {
    UserProfile {
        id: "user-1".to_string(),
        email: "ada@example.com".to_string(),
        name: "Ada".to_string(),
        picture: None,
    }
}

// ============================================================================
// Scripted responses
// ============================================================================

/// Queue of scripted results with a fallback once the queue is drained
pub struct Responses<T: Clone> {
    queue: Mutex<VecDeque<Result<T, AuthError>>>,
    fallback: Mutex<Result<T, AuthError>>,
}

impl<T: Clone> Responses<T> {
    pub fn always(result: Result<T, AuthError>) -> Self {
        Self { queue: Mutex::new(VecDeque::new()), fallback: Mutex::new(result) }
    }

    pub fn unscripted() -> Self {
        Self::always(Err(AuthError::Network("unscripted call".to_string())))
    }

    /// Replace the fallback result
    pub fn set(&self, result: Result<T, AuthError>) {
        *self.fallback.lock() = result;
    }

    /// Queue a one-off result ahead of the fallback
    pub fn push(&self, result: Result<T, AuthError>) {
        self.queue.lock().push_back(result);
    }

    fn next(&self) -> Result<T, AuthError> {
        if let Some(result) = self.queue.lock().pop_front() {
            return result;
        }
        self.fallback.lock().clone()
    }
}

pub fn backend_error(status: u16) -> AuthError {
    AuthError::Backend { status, message: format!("HTTP {status}") }
}

pub fn network_error() -> AuthError {
    AuthError::Network("connection refused".to_string())
}

// ============================================================================
// Identity backend
// ============================================================================

pub struct MockIdentityBackend {
    pub tokens: Mutex<Option<TokenGrant>>,
    pub refresh: Responses<TokenGrant>,
    pub get_calls: AtomicU32,
    pub refresh_calls: AtomicU32,
    pub clear_calls: AtomicU32,
    pub delay: Mutex<Duration>,
}

impl MockIdentityBackend {
    /// Backend holding a one-hour session whose refresh succeeds
    pub fn signed_in() -> Self {
        let backend = Self::signed_out();
        *backend.tokens.lock() = Some(TokenGrant::new("identity-1", 3600));
        backend.refresh.set(Ok(TokenGrant::new("identity-2", 3600)));
        backend
    }

    pub fn signed_out() -> Self {
        Self {
            tokens: Mutex::new(None),
            refresh: Responses::unscripted(),
            get_calls: AtomicU32::new(0),
            refresh_calls: AtomicU32::new(0),
            clear_calls: AtomicU32::new(0),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    pub fn refresh_calls(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityBackend for MockIdentityBackend {
    async fn get_tokens(&self) -> Result<Option<TokenGrant>, AuthError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.tokens.lock().clone())
    }

    async fn set_tokens(&self, grant: &TokenGrant) -> Result<(), AuthError> {
        *self.tokens.lock() = Some(grant.clone());
        Ok(())
    }

    async fn refresh_access_token(&self) -> Result<TokenGrant, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.refresh.next()
    }

    async fn clear_tokens(&self) -> Result<(), AuthError> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        *self.tokens.lock() = None;
        Ok(())
    }
}

/// Identity provider that always has a token
pub struct StaticIdentity;

#[async_trait]
impl AccessTokenProvider for StaticIdentity {
    async fn access_token(&self) -> Result<String, AuthError> {
        Ok("identity-token".to_string())
    }
}

// ============================================================================
// OAuth backend proxy and provider
// ============================================================================

pub struct MockOAuthBackend {
    pub exchange: Responses<TokenGrant>,
    pub refresh: Responses<TokenGrant>,
    pub exchange_calls: AtomicU32,
    pub refresh_calls: AtomicU32,
    pub logout_calls: AtomicU32,
    /// Refresh token sent with each refresh; `None` means the cookie
    pub refresh_tokens_seen: Mutex<Vec<Option<String>>>,
    pub delay: Mutex<Duration>,
}

impl Default for MockOAuthBackend {
    fn default() -> Self {
        Self {
            exchange: Responses::unscripted(),
            refresh: Responses::unscripted(),
            exchange_calls: AtomicU32::new(0),
            refresh_calls: AtomicU32::new(0),
            logout_calls: AtomicU32::new(0),
            refresh_tokens_seen: Mutex::new(Vec::new()),
            delay: Mutex::new(Duration::ZERO),
        }
    }
}

impl MockOAuthBackend {
    pub fn exchange_calls(&self) -> u32 {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl OAuthBackend for MockOAuthBackend {
    async fn exchange_code(
        &self,
        _identity_token: &str,
        _code: &str,
        _redirect_uri: &str,
    ) -> Result<TokenGrant, AuthError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.exchange.next()
    }

    async fn refresh_token(
        &self,
        _identity_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<TokenGrant, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_tokens_seen.lock().push(refresh_token.map(str::to_string));
        self.pause().await;
        self.refresh.next()
    }

    async fn logout(&self, _identity_token: &str) -> Result<(), AuthError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockProvider {
    pub exchange: Responses<TokenGrant>,
    pub refresh: Responses<TokenGrant>,
    pub user_info: Responses<UserProfile>,
    pub exchange_calls: AtomicU32,
    pub refresh_calls: AtomicU32,
    pub revoke_calls: AtomicU32,
    pub user_info_calls: AtomicU32,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            exchange: Responses::unscripted(),
            refresh: Responses::unscripted(),
            user_info: Responses::always(Ok(profile())),
            exchange_calls: AtomicU32::new(0),
            refresh_calls: AtomicU32::new(0),
            revoke_calls: AtomicU32::new(0),
            user_info_calls: AtomicU32::new(0),
        }
    }
}

impl MockProvider {
    pub fn exchange_calls(&self) -> u32 {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OAuthProvider for MockProvider {
    async fn exchange_code(
        &self,
        _code: &str,
        _redirect_uri: &str,
        _client: &ClientCredentials,
    ) -> Result<TokenGrant, AuthError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        self.exchange.next()
    }

    async fn refresh(
        &self,
        _refresh_token: &str,
        _client: &ClientCredentials,
    ) -> Result<TokenGrant, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh.next()
    }

    async fn revoke(&self, _token: &str) -> Result<(), AuthError> {
        self.revoke_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn user_info(&self, _access_token: &str) -> Result<UserProfile, AuthError> {
        self.user_info_calls.fetch_add(1, Ordering::SeqCst);
        self.user_info.next()
    }
}

// ============================================================================
// State store
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn raw(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: impl Into<String>) {
        self.values.lock().insert(key.to_string(), value.into());
    }

    /// Persist `credential` where the OAuth lifecycle looks for it
    pub fn seed_credential(&self, credential: &Credential) {
        let raw = serde_json::to_string(credential).unwrap();
        self.insert(KEY_OAUTH_CREDENTIAL, raw);
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, key: &str) -> DomainResult<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> DomainResult<()> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> DomainResult<()> {
        self.values.lock().remove(key);
        Ok(())
    }
}

// ============================================================================
// Harnesses
// ============================================================================

/// OAuth lifecycle wired to mocks, with a permanently signed-in identity
pub struct OAuthHarness {
    pub lifecycle: OAuthTokenLifecycle,
    pub backend: Arc<MockOAuthBackend>,
    pub provider: Arc<MockProvider>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<MockClock>,
}

impl OAuthHarness {
    pub fn new(allow_direct_fallback: bool) -> Self {
        let backend = Arc::new(MockOAuthBackend::default());
        let provider = Arc::new(MockProvider::default());
        let store = Arc::new(MemoryStore::default());
        let clock = clock();

        let lifecycle = OAuthTokenLifecycle::new(
            oauth_config(),
            allow_direct_fallback,
            OAuthPorts {
                backend: backend.clone(),
                provider: provider.clone(),
                identity: Arc::new(StaticIdentity),
                store: store.clone(),
                clock: clock.clone(),
            },
        );
        Self { lifecycle, backend, provider, store, clock }
    }

    /// Credential expiring `expires_in_secs` from the test epoch
    pub fn credential(&self, expires_in_secs: i64) -> Credential {
        Credential::from_grant(
            full_grant("access-0", expires_in_secs),
            self.clock.now_ms(),
            CredentialOrigin::BackendProxy,
        )
    }

    /// Persist a credential and load it into the lifecycle
    pub async fn sign_in(&self, expires_in_secs: i64) {
        self.store.seed_credential(&self.credential(expires_in_secs));
        assert!(self.lifecycle.load_persisted().await.unwrap());
    }
}

/// Coordinator over a real identity lifecycle and a real OAuth lifecycle
pub struct CoordinatorHarness {
    pub coordinator: AuthCoordinator,
    pub identity: IdentityTokenLifecycle,
    pub oauth: OAuthTokenLifecycle,
    pub identity_backend: Arc<MockIdentityBackend>,
    pub oauth_backend: Arc<MockOAuthBackend>,
    pub provider: Arc<MockProvider>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<MockClock>,
}

impl CoordinatorHarness {
    pub fn new(identity_backend: MockIdentityBackend) -> Self {
        let identity_backend = Arc::new(identity_backend);
        let oauth_backend = Arc::new(MockOAuthBackend::default());
        let provider = Arc::new(MockProvider::default());
        let store = Arc::new(MemoryStore::default());
        let clock = clock();

        let identity = identity_lifecycle(identity_backend.clone(), clock.clone());
        let oauth = OAuthTokenLifecycle::new(
            oauth_config(),
            false,
            OAuthPorts {
                backend: oauth_backend.clone(),
                provider: provider.clone(),
                identity: Arc::new(identity.clone()),
                store: store.clone(),
                clock: clock.clone(),
            },
        );
        let coordinator = AuthCoordinator::new(identity.clone(), oauth.clone());

        Self {
            coordinator,
            identity,
            oauth,
            identity_backend,
            oauth_backend,
            provider,
            store,
            clock,
        }
    }

    /// Count deliveries of `kind`
    pub fn count_events(&self, kind: AuthEventKind) -> Arc<AtomicU32> {
        let counter = Arc::new(AtomicU32::new(0));
        let sink = Arc::clone(&counter);
        let _subscription = self.coordinator.subscribe(kind, move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        });
        counter
    }
}

pub fn identity_lifecycle(
    backend: Arc<MockIdentityBackend>,
    clock: Arc<MockClock>,
) -> IdentityTokenLifecycle {
    IdentityTokenLifecycle::new(backend, clock, IdentityConfig::default())
}

// ============================================================================
// Sync collaborators
// ============================================================================

#[derive(Default)]
pub struct MockRemote {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
    pub fail: Mutex<bool>,
    pub uploads: AtomicU32,
}

impl MockRemote {
    fn check(&self) -> DomainResult<()> {
        if *self.fail.lock() {
            return Err(ChatLabError::Network("remote unavailable".to_string()));
        }
        Ok(())
    }
}

fn object(name: &str, bytes: &[u8]) -> RemoteObject {
    RemoteObject {
        name: name.to_string(),
        size_bytes: bytes.len() as u64,
        modified_at: DateTime::<Utc>::from_timestamp_millis(EPOCH_MS).unwrap(),
    }
}

#[async_trait]
impl RemoteObjectStore for MockRemote {
    async fn list(&self, _access_token: &str) -> DomainResult<Vec<RemoteObject>> {
        self.check()?;
        Ok(self.objects.lock().iter().map(|(name, bytes)| object(name, bytes)).collect())
    }

    async fn upload(
        &self,
        _access_token: &str,
        name: &str,
        bytes: Vec<u8>,
    ) -> DomainResult<RemoteObject> {
        self.check()?;
        self.uploads.fetch_add(1, Ordering::SeqCst);
        let stored = object(name, &bytes);
        self.objects.lock().insert(name.to_string(), bytes);
        Ok(stored)
    }

    async fn download(&self, _access_token: &str, name: &str) -> DomainResult<Option<Vec<u8>>> {
        self.check()?;
        Ok(self.objects.lock().get(name).cloned())
    }

    async fn delete(&self, _access_token: &str, name: &str) -> DomainResult<bool> {
        self.check()?;
        Ok(self.objects.lock().remove(name).is_some())
    }
}

#[derive(Default)]
pub struct MockDatabase {
    pub snapshot: Mutex<Vec<u8>>,
    pub imported: Mutex<Vec<Vec<u8>>>,
    pub pending: Mutex<u64>,
    pub mark_synced_calls: AtomicU32,
}

#[async_trait]
impl LocalDatabase for MockDatabase {
    async fn export_snapshot(&self) -> DomainResult<Vec<u8>> {
        Ok(self.snapshot.lock().clone())
    }

    async fn import_snapshot(&self, bytes: &[u8]) -> DomainResult<()> {
        self.imported.lock().push(bytes.to_vec());
        Ok(())
    }

    async fn count_pending_changes(&self) -> DomainResult<u64> {
        Ok(*self.pending.lock())
    }

    async fn mark_synced(&self) -> DomainResult<()> {
        self.mark_synced_calls.fetch_add(1, Ordering::SeqCst);
        *self.pending.lock() = 0;
        Ok(())
    }
}

/// Token source for the sync service
pub struct FixedTokens(pub Result<String, AuthError>);

#[async_trait]
impl AccessTokenProvider for FixedTokens {
    async fn access_token(&self) -> Result<String, AuthError> {
        self.0.clone()
    }
}

/// Sync operation with scripted outcomes; fails once the script runs out
#[derive(Default)]
pub struct ScriptedSync {
    pub outcomes: Mutex<VecDeque<Result<SyncReport, SyncError>>>,
    pub calls: AtomicU32,
}

impl ScriptedSync {
    pub fn failing() -> Self {
        Self::default()
    }

    pub fn succeeding(times: usize) -> Self {
        let sync = Self::default();
        for _ in 0..times {
            sync.outcomes.lock().push_back(Ok(report()));
        }
        sync
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn report() -> SyncReport {
    SyncReport {
        pending_before: 1,
        uploaded_bytes: 2,
        imported_remote: false,
        completed_at: DateTime::<Utc>::from_timestamp_millis(EPOCH_MS).unwrap(),
    }
}

#[async_trait]
impl SyncOperation for ScriptedSync {
    async fn sync(&self) -> Result<SyncReport, SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcomes
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::Remote("remote unavailable".to_string())))
    }
}
