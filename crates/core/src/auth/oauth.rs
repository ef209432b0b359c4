//! Google OAuth credential lifecycle
//!
//! Owns the one Google credential of the session. Code exchange and refresh
//! go through the backend proxy, which keeps the client secret server-side
//! and holds the refresh token in an HTTP-only cookie companion. Only a
//! connectivity failure of the proxy may fall back to calling the provider
//! directly, and only when the fallback is enabled (development builds).
//!
//! Refresh is single-flight: concurrent callers share one network call.
//! Every refresh records the cache generation first, so a logout that
//! happens mid-flight wins over the late result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chatlab_common::sync::SingleFlight;
use chatlab_common::time::{Clock, TimerSlot};
use chatlab_domain::constants::{
    KEY_OAUTH_CREDENTIAL, KEY_OAUTH_PENDING_STATE, KEY_USER_PROFILE, OAUTH_SAFETY_MARGIN_SECS,
    PROACTIVE_REFRESH_RETRY_SECS, PROACTIVE_REFRESH_WINDOW_SECS, TOKEN_VALIDATION_INTERVAL_SECS,
};
use chatlab_domain::{
    AuthorizationRequest, Credential, CredentialOrigin, OAuthConfig, PendingAuthorization,
    TokenGrant, UserProfile,
};
use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use super::error::AuthError;
use super::ports::{AccessTokenProvider, ClientCredentials, OAuthBackend, OAuthProvider};
use super::schedule::{plan, RefreshPlan};
use super::scopes::{build_authorize_url, generate_state, merge_scopes, validate_state};
use super::token_cache::TokenCache;
use crate::state_ports::{load_json, save_json, StateStore};

const REFRESH_WINDOW: Duration = Duration::from_secs(PROACTIVE_REFRESH_WINDOW_SECS);
const REFRESH_RETRY: Duration = Duration::from_secs(PROACTIVE_REFRESH_RETRY_SECS);
const VALIDATION_INTERVAL: Duration = Duration::from_secs(TOKEN_VALIDATION_INTERVAL_SECS);

/// Collaborators of [`OAuthTokenLifecycle`]
#[derive(Clone)]
pub struct OAuthPorts {
    pub backend: Arc<dyn OAuthBackend>,
    pub provider: Arc<dyn OAuthProvider>,
    /// Identity token used to authorise backend proxy calls
    pub identity: Arc<dyn AccessTokenProvider>,
    pub store: Arc<dyn StateStore>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshSource {
    /// Local refresh token, or the cookie companion for proxy credentials
    Stored,
    /// Cookie companion only (restore after restart)
    Cookie,
}

/// Lifecycle of the Google OAuth credential
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct OAuthTokenLifecycle {
    inner: Arc<Inner>,
}

struct Inner {
    backend: Arc<dyn OAuthBackend>,
    provider: Arc<dyn OAuthProvider>,
    identity: Arc<dyn AccessTokenProvider>,
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    config: OAuthConfig,
    allow_direct_fallback: bool,
    cache: TokenCache,
    profile: RwLock<Option<UserProfile>>,
    is_authenticating: AtomicBool,
    refresh_flight: SingleFlight<Result<Credential, AuthError>>,
    proactive: TimerSlot,
    validation: TimerSlot,
}

impl OAuthTokenLifecycle {
    #[must_use]
    pub fn new(config: OAuthConfig, allow_direct_fallback: bool, ports: OAuthPorts) -> Self {
        let cache = TokenCache::new(
            "oauth",
            Arc::clone(&ports.clock),
            Duration::from_secs(OAUTH_SAFETY_MARGIN_SECS),
            Some((Arc::clone(&ports.store), KEY_OAUTH_CREDENTIAL)),
        );
        if allow_direct_fallback {
            warn!("direct-provider OAuth fallback is enabled; do not use in production");
        }

        Self {
            inner: Arc::new(Inner {
                backend: ports.backend,
                provider: ports.provider,
                identity: ports.identity,
                store: ports.store,
                clock: ports.clock,
                config,
                allow_direct_fallback,
                cache,
                profile: RwLock::new(None),
                is_authenticating: AtomicBool::new(false),
                refresh_flight: SingleFlight::new("oauth-refresh"),
                proactive: TimerSlot::new("oauth-proactive-refresh"),
                validation: TimerSlot::new("oauth-validation"),
            }),
        }
    }

    /// Hydrate the credential and profile persisted by a previous run
    ///
    /// Returns whether a credential was found. Arms the refresh timers, or
    /// refreshes inline when the credential is already inside the window.
    #[instrument(skip(self), name = "oauth.load_persisted")]
    pub async fn load_persisted(&self) -> Result<bool, AuthError> {
        let profile: Option<UserProfile> =
            load_json(self.inner.store.as_ref(), KEY_USER_PROFILE).await?;
        *self.inner.profile.write() = profile;

        if self.inner.cache.load().await?.is_none() {
            return Ok(false);
        }
        self.inner.after_update().await;
        Ok(self.inner.cache.get().is_some())
    }

    /// Begin the authorization redirect for the required scopes
    ///
    /// Returns `None` while another authorization is already outstanding.
    /// A pending anti-forgery state survives restarts and is reused.
    pub async fn authenticate(&self) -> Result<Option<AuthorizationRequest>, AuthError> {
        let scopes = self.inner.config.required_scopes.clone();
        self.inner.begin_authorization(scopes).await
    }

    /// Re-run the authorization redirect with `scopes` added to the required
    /// set
    ///
    /// The expanded set is what the matching callback validates.
    pub async fn request_additional_scopes(
        &self,
        scopes: &[String],
    ) -> Result<Option<AuthorizationRequest>, AuthError> {
        let merged = merge_scopes(&self.inner.config.required_scopes, scopes);
        self.inner.begin_authorization(merged).await
    }

    /// Abandon an outstanding authorization redirect
    pub async fn cancel_authentication(&self) -> Result<(), AuthError> {
        self.inner.is_authenticating.store(false, Ordering::SeqCst);
        self.inner.store.remove(KEY_OAUTH_PENDING_STATE).await?;
        Ok(())
    }

    /// Whether an authorization redirect is outstanding
    #[must_use]
    pub fn is_authenticating(&self) -> bool {
        self.inner.is_authenticating.load(Ordering::SeqCst)
    }

    /// Complete the redirect: validate `state`, exchange `code`, validate
    /// the granted scopes
    ///
    /// The pending state is consumed whatever the outcome.
    ///
    /// # Errors
    /// - `InvalidState` when no authorization is pending or `state` does not
    ///   match; no network call is made
    /// - `InsufficientScopes` when the grant lacks a required scope; nothing
    ///   is stored
    #[instrument(skip_all, name = "oauth.process_callback")]
    pub async fn process_callback(&self, code: &str, state: &str) -> Result<Credential, AuthError> {
        let result = self.inner.complete_authorization(code, state).await;
        self.inner.is_authenticating.store(false, Ordering::SeqCst);

        let credential = result?;
        if let Err(err) = self.fetch_user_profile().await {
            warn!(error = %err, "profile fetch after sign-in failed");
        }
        info!(scopes = credential.granted_scopes.len(), "oauth sign-in completed");
        Ok(credential)
    }

    /// Return a valid access token, refreshing first when it is expiring
    ///
    /// # Errors
    /// `AuthenticationRequired` when signed out or when a needed refresh has
    /// no refresh source.
    pub async fn get_access_token(&self) -> Result<String, AuthError> {
        if self.inner.cache.is_fresh() {
            if let Some(credential) = self.inner.cache.get() {
                return Ok(credential.access_token);
            }
        }
        if self.inner.cache.get().is_none() {
            return Err(AuthError::AuthenticationRequired("not signed in to Google".to_string()));
        }
        Ok(self.refresh().await?.access_token)
    }

    /// Refresh the credential; concurrent calls share one refresh
    pub async fn refresh(&self) -> Result<Credential, AuthError> {
        self.inner.refresh_shared(RefreshSource::Stored).await
    }

    /// Restore the credential from the backend's refresh-token cookie
    ///
    /// Joins an in-flight refresh instead of starting a second one. Scopes
    /// are validated when the backend reports them.
    #[instrument(skip(self), name = "oauth.restore_from_cookie")]
    pub async fn restore_from_cookie(&self) -> Result<Credential, AuthError> {
        self.inner.refresh_shared(RefreshSource::Cookie).await
    }

    /// Sign out: local state is cleared first, then the provider token is
    /// revoked and the cookie companion dropped, both best-effort
    #[instrument(skip(self), name = "oauth.logout")]
    pub async fn logout(&self) -> Result<(), AuthError> {
        let previous = self.inner.cache.get();
        self.inner.reset_local().await?;
        self.inner.is_authenticating.store(false, Ordering::SeqCst);
        *self.inner.profile.write() = None;
        self.inner.store.remove(KEY_USER_PROFILE).await?;
        self.inner.store.remove(KEY_OAUTH_PENDING_STATE).await?;

        if let Some(credential) = previous {
            let token = credential.refresh_token.as_deref().unwrap_or(&credential.access_token);
            if let Err(err) = self.inner.provider.revoke(token).await {
                warn!(error = %err, "provider token revocation failed");
            }
        }

        match self.inner.identity.access_token().await {
            Ok(identity) => {
                if let Err(err) = self.inner.backend.logout(&identity).await {
                    warn!(error = %err, "failed to clear oauth cookie companion");
                }
            }
            Err(err) => warn!(error = %err, "no identity token to clear oauth cookie companion"),
        }

        info!("oauth credential cleared");
        Ok(())
    }

    /// Same as [`OAuthTokenLifecycle::logout`]
    pub async fn revoke(&self) -> Result<(), AuthError> {
        self.logout().await
    }

    /// Whether the current credential was granted `scope`
    #[must_use]
    pub fn has_required_additional_scope(&self, scope: &str) -> bool {
        self.inner.cache.get().is_some_and(|credential| credential.has_scope(scope))
    }

    #[must_use]
    pub fn user_profile(&self) -> Option<UserProfile> {
        self.inner.profile.read().clone()
    }

    /// Fetch the userinfo profile and persist it
    pub async fn fetch_user_profile(&self) -> Result<UserProfile, AuthError> {
        let token = self.get_access_token().await?;
        let profile = self.inner.provider.user_info(&token).await?;
        save_json(self.inner.store.as_ref(), KEY_USER_PROFILE, &profile).await?;
        *self.inner.profile.write() = Some(profile.clone());
        debug!("user profile refreshed");
        Ok(profile)
    }

    #[must_use]
    pub fn credential(&self) -> Option<Credential> {
        self.inner.cache.get()
    }

    /// Whether a credential is held; it may still need a refresh
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.cache.get().is_some()
    }

    /// Whether a credential is held and outside the safety margin
    #[must_use]
    pub fn has_fresh_credential(&self) -> bool {
        self.inner.cache.is_fresh()
    }

    /// Delay until the armed proactive refresh fires
    #[must_use]
    pub fn next_refresh_in(&self) -> Option<Duration> {
        self.inner.proactive.remaining()
    }

    /// Cancel every timer; the credential is kept
    pub fn shutdown(&self) {
        self.inner.proactive.cancel();
        self.inner.validation.cancel();
    }
}

impl Inner {
    async fn begin_authorization(
        &self,
        scopes: Vec<String>,
    ) -> Result<Option<AuthorizationRequest>, AuthError> {
        if self.is_authenticating.swap(true, Ordering::SeqCst) {
            debug!("authorization already in progress");
            return Ok(None);
        }

        let result = self.persist_pending(scopes).await;
        if result.is_err() {
            self.is_authenticating.store(false, Ordering::SeqCst);
        }
        let pending = result?;

        let url = build_authorize_url(&self.config, &pending.state, &pending.scopes);
        info!(scopes = pending.scopes.len(), "authorization redirect prepared");
        Ok(Some(AuthorizationRequest { url, state: pending.state }))
    }

    async fn persist_pending(
        &self,
        scopes: Vec<String>,
    ) -> Result<PendingAuthorization, AuthError> {
        let existing: Option<PendingAuthorization> =
            load_json(self.store.as_ref(), KEY_OAUTH_PENDING_STATE).await?;
        let state = match existing {
            Some(pending) => {
                debug!("reusing pending authorization state");
                pending.state
            }
            None => generate_state(),
        };

        let pending = PendingAuthorization { state, scopes, created_at_ms: self.clock.now_ms() };
        save_json(self.store.as_ref(), KEY_OAUTH_PENDING_STATE, &pending).await?;
        Ok(pending)
    }

    async fn complete_authorization(
        self: &Arc<Self>,
        code: &str,
        state: &str,
    ) -> Result<Credential, AuthError> {
        let pending: Option<PendingAuthorization> =
            load_json(self.store.as_ref(), KEY_OAUTH_PENDING_STATE).await?;
        self.store.remove(KEY_OAUTH_PENDING_STATE).await?;

        let Some(pending) = pending else {
            warn!("oauth callback without a pending authorization");
            return Err(AuthError::InvalidState("no authorization in progress".to_string()));
        };
        if !validate_state(&pending.state, state) {
            warn!("oauth callback state mismatch");
            return Err(AuthError::InvalidState("state does not match".to_string()));
        }

        let generation = self.cache.generation();
        let (grant, origin) = self.exchange(code).await?;
        let credential = Credential::from_grant(grant, self.clock.now_ms(), origin);

        let missing = credential.missing_scopes(&pending.scopes);
        if !missing.is_empty() {
            warn!(?missing, "grant is missing required scopes");
            self.reset_local().await?;
            return Err(AuthError::InsufficientScopes {
                granted: credential.granted_scopes.iter().cloned().collect(),
                required: pending.scopes,
            });
        }

        if !self.cache.set_if_current(credential.clone(), generation).await? {
            return Err(AuthError::AuthenticationRequired(
                "signed out while exchanging the code".to_string(),
            ));
        }
        self.after_update().await;
        Ok(self.cache.get().unwrap_or(credential))
    }

    async fn exchange(&self, code: &str) -> Result<(TokenGrant, CredentialOrigin), AuthError> {
        let identity = self.identity.access_token().await?;
        match self.backend.exchange_code(&identity, code, &self.config.redirect_uri).await {
            Ok(grant) => Ok((grant, CredentialOrigin::BackendProxy)),
            Err(err) if err.is_connectivity() && self.allow_direct_fallback => {
                warn!(error = %err, "backend proxy unreachable; exchanging code with provider");
                let client = self.client_credentials()?;
                let grant =
                    self.provider.exchange_code(code, &self.config.redirect_uri, &client).await?;
                Ok((grant, CredentialOrigin::DirectProvider))
            }
            Err(err) => Err(err),
        }
    }

    async fn refresh_shared(
        self: &Arc<Self>,
        source: RefreshSource,
    ) -> Result<Credential, AuthError> {
        let inner = Arc::clone(self);
        self.refresh_flight.run(move || async move { inner.do_refresh(source).await }).await
    }

    async fn do_refresh(self: &Arc<Self>, source: RefreshSource) -> Result<Credential, AuthError> {
        let generation = self.cache.generation();
        let current = self.cache.get();

        let refresh_token = match source {
            RefreshSource::Stored => {
                let Some(credential) = current.as_ref() else {
                    return Err(AuthError::AuthenticationRequired(
                        "not signed in to Google".to_string(),
                    ));
                };
                if credential.refresh_token.is_none()
                    && credential.origin != CredentialOrigin::BackendProxy
                {
                    return Err(AuthError::AuthenticationRequired(
                        "no refresh token available".to_string(),
                    ));
                }
                credential.refresh_token.clone()
            }
            RefreshSource::Cookie => None,
        };

        let identity = self.identity.access_token().await?;
        let (grant, origin) = match self.request_refresh(&identity, refresh_token.as_deref()).await
        {
            Ok(result) => result,
            Err(err) if err.is_fatal_to_session() => {
                warn!(error = %err, "refresh token rejected; clearing credential");
                self.reset_local().await?;
                return Err(err);
            }
            Err(err) => {
                warn!(error = %err, ?source, "oauth refresh failed");
                return Err(err);
            }
        };

        if source == RefreshSource::Cookie && grant.scope.is_some() {
            let granted = grant.scopes();
            let missing: Vec<&String> =
                self.config.required_scopes.iter().filter(|s| !granted.contains(*s)).collect();
            if !missing.is_empty() {
                warn!(?missing, "restored credential is missing required scopes");
                self.reset_local().await?;
                return Err(AuthError::InsufficientScopes {
                    granted: granted.into_iter().collect(),
                    required: self.config.required_scopes.clone(),
                });
            }
        }

        let now_ms = self.clock.now_ms();
        let credential = match current {
            Some(previous) => previous.refreshed(grant, now_ms, origin),
            None => Credential::from_grant(grant, now_ms, origin),
        };
        if !self.cache.set_if_current(credential.clone(), generation).await? {
            debug!("discarding refresh result from a signed-out session");
            return Err(AuthError::AuthenticationRequired(
                "signed out during refresh".to_string(),
            ));
        }

        self.schedule_next();
        debug!(?source, ?origin, "oauth credential refreshed");
        Ok(credential)
    }

    async fn request_refresh(
        &self,
        identity: &str,
        refresh_token: Option<&str>,
    ) -> Result<(TokenGrant, CredentialOrigin), AuthError> {
        match self.backend.refresh_token(identity, refresh_token).await {
            Ok(grant) => Ok((grant, CredentialOrigin::BackendProxy)),
            Err(err) if err.is_connectivity() && self.allow_direct_fallback => {
                // The cookie companion is unreachable without the proxy
                let Some(refresh_token) = refresh_token else {
                    return Err(err);
                };
                warn!(error = %err, "backend proxy unreachable; refreshing with provider");
                let client = self.client_credentials()?;
                let grant = self.provider.refresh(refresh_token, &client).await?;
                Ok((grant, CredentialOrigin::DirectProvider))
            }
            Err(err) => Err(err),
        }
    }

    fn client_credentials(&self) -> Result<ClientCredentials, AuthError> {
        let client_secret = self.config.client_secret.clone().ok_or_else(|| {
            AuthError::Config("direct-provider fallback requires a client secret".to_string())
        })?;
        Ok(ClientCredentials { client_id: self.config.client_id.clone(), client_secret })
    }

    /// Arm timers for a credential that was just loaded or exchanged
    async fn after_update(self: &Arc<Self>) {
        let Some(remaining) = self.cache.time_until_expiry_ms() else {
            return;
        };
        match plan(remaining, REFRESH_WINDOW) {
            RefreshPlan::After(delay) => {
                self.arm_proactive(delay);
                self.ensure_validation();
            }
            RefreshPlan::Now => {
                debug!(remaining_ms = remaining, "credential inside refresh window; refreshing");
                if let Err(err) = self.refresh_shared(RefreshSource::Stored).await {
                    if !err.is_fatal_to_session() {
                        self.arm_proactive(REFRESH_RETRY);
                        self.ensure_validation();
                    }
                }
            }
        }
    }

    fn schedule_next(self: &Arc<Self>) {
        let Some(remaining) = self.cache.time_until_expiry_ms() else {
            return;
        };
        let delay = match plan(remaining, REFRESH_WINDOW) {
            RefreshPlan::After(delay) => delay,
            // Short-lived token: avoid refreshing in a hot loop
            RefreshPlan::Now => REFRESH_RETRY,
        };
        self.arm_proactive(delay);
        self.ensure_validation();
    }

    fn arm_proactive(self: &Arc<Self>, delay: Duration) {
        let weak = Arc::downgrade(self);
        self.proactive.schedule(delay, move || async move {
            if let Some(inner) = weak.upgrade() {
                inner.run_proactive().await;
            }
        });
        debug!(?delay, "oauth proactive refresh armed");
    }

    async fn run_proactive(self: &Arc<Self>) {
        if self.cache.get().is_none() {
            return;
        }
        match self.refresh_shared(RefreshSource::Stored).await {
            Ok(_) => {}
            Err(err) if err.is_fatal_to_session() => {
                info!("oauth session ended; proactive refresh stopped");
            }
            Err(err) => {
                warn!(error = %err, "proactive oauth refresh failed; retrying in one minute");
                self.arm_proactive(REFRESH_RETRY);
            }
        }
    }

    fn ensure_validation(self: &Arc<Self>) {
        if self.validation.is_armed() {
            return;
        }
        let weak: Weak<Self> = Arc::downgrade(self);
        self.validation.schedule_every(VALIDATION_INTERVAL, move || {
            let weak = weak.clone();
            async move {
                if let Some(inner) = weak.upgrade() {
                    inner.validate().await;
                }
            }
        });
    }

    async fn validate(self: &Arc<Self>) {
        if !self.cache.needs_renewal(REFRESH_WINDOW) {
            return;
        }
        debug!("oauth credential expiring soon; validating");
        match self.refresh_shared(RefreshSource::Stored).await {
            Ok(_) => {}
            Err(err) if err.is_fatal_to_session() => {}
            Err(err) => {
                warn!(error = %err, "validation refresh failed; restoring from cookie");
                if let Err(err) = self.refresh_shared(RefreshSource::Cookie).await {
                    warn!(error = %err, "cookie restore after failed validation also failed");
                }
            }
        }
    }

    async fn reset_local(&self) -> Result<(), AuthError> {
        self.proactive.cancel();
        self.validation.cancel();
        self.cache.clear().await
    }
}

#[async_trait]
impl AccessTokenProvider for OAuthTokenLifecycle {
    async fn access_token(&self) -> Result<String, AuthError> {
        self.get_access_token().await
    }
}

impl std::fmt::Debug for OAuthTokenLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthTokenLifecycle")
            .field("cache", &self.inner.cache)
            .field("allow_direct_fallback", &self.inner.allow_direct_fallback)
            .field("is_authenticating", &self.is_authenticating())
            .field("refresh_in_flight", &self.inner.refresh_flight.is_in_flight())
            .finish_non_exhaustive()
    }
}
