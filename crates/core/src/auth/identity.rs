//! Vault identity token lifecycle
//!
//! The session token lives behind an HTTP-only cookie owned by the identity
//! backend, so the cache here is memory-only. `ensure_access_token` hands out
//! the cached token while it is fresh and otherwise runs one shared refresh
//! with bounded retries under an overall timeout.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chatlab_common::error::ErrorClassification;
use chatlab_common::sync::SingleFlight;
use chatlab_common::time::{Clock, TimerSlot};
use chatlab_domain::constants::{
    IDENTITY_RETRY_BACKOFF_MS, PROACTIVE_REFRESH_RETRY_SECS, PROACTIVE_REFRESH_WINDOW_SECS,
    TOKEN_VALIDATION_INTERVAL_SECS,
};
use chatlab_domain::{Credential, CredentialOrigin, IdentityConfig, TokenGrant};
use tracing::{debug, info, instrument, warn};

use super::error::AuthError;
use super::ports::{AccessTokenProvider, IdentityBackend};
use super::schedule::{plan, RefreshPlan};
use super::token_cache::TokenCache;

const REFRESH_WINDOW: Duration = Duration::from_secs(PROACTIVE_REFRESH_WINDOW_SECS);
const REFRESH_RETRY: Duration = Duration::from_secs(PROACTIVE_REFRESH_RETRY_SECS);
const VALIDATION_INTERVAL: Duration = Duration::from_secs(TOKEN_VALIDATION_INTERVAL_SECS);

/// Options for [`IdentityTokenLifecycle::ensure_access_token`]
///
/// Unset fields fall back to the lifecycle's [`IdentityConfig`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnsureTokenOptions {
    /// Refresh even when the cached token is still fresh
    pub force_refresh: bool,
    /// Overall wait budget for the refresh
    pub timeout: Option<Duration>,
    /// Refresh attempts before giving up
    pub max_attempts: Option<u32>,
}

impl EnsureTokenOptions {
    #[must_use]
    pub fn forced() -> Self {
        Self { force_refresh: true, ..Self::default() }
    }
}

/// Lifecycle of the application's own session token
///
/// Cheap to clone; clones share the same cache, flight and timers.
#[derive(Clone)]
pub struct IdentityTokenLifecycle {
    inner: Arc<Inner>,
}

struct Inner {
    backend: Arc<dyn IdentityBackend>,
    cache: TokenCache,
    clock: Arc<dyn Clock>,
    config: IdentityConfig,
    refresh_flight: SingleFlight<Result<String, AuthError>>,
    proactive: TimerSlot,
    validation: TimerSlot,
}

impl IdentityTokenLifecycle {
    #[must_use]
    pub fn new(
        backend: Arc<dyn IdentityBackend>,
        clock: Arc<dyn Clock>,
        config: IdentityConfig,
    ) -> Self {
        let cache = TokenCache::new(
            "identity",
            Arc::clone(&clock),
            Duration::from_secs(config.safety_margin_secs),
            None,
        );
        Self {
            inner: Arc::new(Inner {
                backend,
                cache,
                clock,
                config,
                refresh_flight: SingleFlight::new("identity-refresh"),
                proactive: TimerSlot::new("identity-proactive-refresh"),
                validation: TimerSlot::new("identity-validation"),
            }),
        }
    }

    /// Hydrate the cache from the cookie-backed store
    ///
    /// Returns whether a session exists. A token already inside the refresh
    /// window is refreshed before returning.
    #[instrument(skip(self), name = "identity.load")]
    pub async fn load(&self) -> Result<bool, AuthError> {
        if !self.inner.hydrate().await? {
            debug!("no identity session in cookie store");
            return Ok(false);
        }

        let Some(remaining) = self.inner.cache.time_until_expiry_ms() else {
            return Ok(false);
        };
        match plan(remaining, REFRESH_WINDOW) {
            RefreshPlan::After(delay) => {
                self.inner.arm_proactive(delay);
                self.inner.ensure_validation();
            }
            RefreshPlan::Now => {
                if let Err(err) = self.inner.refresh_shared(self.inner.config.max_attempts).await {
                    warn!(error = %err, "inline identity refresh after load failed");
                    if !err.is_fatal_to_session() {
                        self.inner.arm_proactive(REFRESH_RETRY);
                        self.inner.ensure_validation();
                    }
                }
            }
        }

        Ok(self.inner.cache.get().is_some())
    }

    /// Store tokens obtained by a vault login
    #[instrument(skip_all, name = "identity.set_tokens")]
    pub async fn set_tokens(&self, grant: TokenGrant) -> Result<(), AuthError> {
        self.inner.backend.set_tokens(&grant).await?;
        let credential = Credential::from_grant(
            grant,
            self.inner.clock.now_ms(),
            CredentialOrigin::IdentityBackend,
        );
        self.inner.cache.set(credential).await?;
        self.inner.schedule_next();
        info!("identity tokens stored");
        Ok(())
    }

    /// Return a valid identity token, refreshing when needed
    ///
    /// # Errors
    /// - `TokenAcquisitionTimeout` when the refresh exceeds the wait budget
    /// - `AuthenticationRequired` when the backend rejects the session
    /// - the last transient error once the attempt budget is spent
    pub async fn ensure_access_token(
        &self,
        options: EnsureTokenOptions,
    ) -> Result<String, AuthError> {
        if !options.force_refresh && self.inner.cache.is_fresh() {
            if let Some(credential) = self.inner.cache.get() {
                return Ok(credential.access_token);
            }
        }

        let timeout = options
            .timeout
            .unwrap_or_else(|| Duration::from_millis(self.inner.config.token_timeout_ms));
        let max_attempts = options.max_attempts.unwrap_or(self.inner.config.max_attempts).max(1);

        match tokio::time::timeout(timeout, self.inner.refresh_shared(max_attempts)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(?timeout, "identity token acquisition timed out");
                Err(AuthError::TokenAcquisitionTimeout(timeout))
            }
        }
    }

    /// Clear the session: timers and cache always, cookie best-effort
    #[instrument(skip(self), name = "identity.clear")]
    pub async fn clear(&self) -> Result<(), AuthError> {
        self.inner.reset_local().await?;
        if let Err(err) = self.inner.backend.clear_tokens().await {
            warn!(error = %err, "failed to clear identity cookie");
        }
        info!("identity session cleared");
        Ok(())
    }

    #[must_use]
    pub fn current(&self) -> Option<Credential> {
        self.inner.cache.get()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.cache.get().is_some()
    }

    /// Delay until the armed proactive refresh fires
    #[must_use]
    pub fn next_refresh_in(&self) -> Option<Duration> {
        self.inner.proactive.remaining()
    }

    /// Cancel every timer; the cached token is kept
    pub fn shutdown(&self) {
        self.inner.proactive.cancel();
        self.inner.validation.cancel();
    }
}

impl Inner {
    /// Read the cookie store into the cache; `false` when it is empty
    async fn hydrate(&self) -> Result<bool, AuthError> {
        let generation = self.cache.generation();
        match self.backend.get_tokens().await? {
            Some(grant) => {
                let credential = Credential::from_grant(
                    grant,
                    self.clock.now_ms(),
                    CredentialOrigin::IdentityBackend,
                );
                self.cache.set_if_current(credential, generation).await
            }
            None => {
                self.cache.clear().await?;
                Ok(false)
            }
        }
    }

    async fn refresh_shared(self: &Arc<Self>, max_attempts: u32) -> Result<String, AuthError> {
        let inner = Arc::clone(self);
        self.refresh_flight
            .run(move || async move { inner.refresh_with_retry(max_attempts).await })
            .await
    }

    async fn refresh_with_retry(self: &Arc<Self>, max_attempts: u32) -> Result<String, AuthError> {
        let generation = self.cache.generation();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.backend.refresh_access_token().await {
                Ok(grant) => {
                    let credential = Credential::from_grant(
                        grant,
                        self.clock.now_ms(),
                        CredentialOrigin::IdentityBackend,
                    );
                    let token = credential.access_token.clone();
                    if !self.cache.set_if_current(credential, generation).await? {
                        return Err(AuthError::AuthenticationRequired(
                            "identity session cleared during refresh".to_string(),
                        ));
                    }
                    self.schedule_next();
                    debug!(attempt, "identity token refreshed");
                    return Ok(token);
                }
                Err(err) if ends_session(&err) => {
                    warn!(error = %err, "identity session rejected; clearing cache");
                    self.reset_local().await?;
                    return Err(AuthError::AuthenticationRequired(err.to_string()));
                }
                Err(err) if attempt < max_attempts && err.is_retryable() => {
                    let pause =
                        Duration::from_millis(IDENTITY_RETRY_BACKOFF_MS * u64::from(attempt));
                    warn!(
                        attempt,
                        max_attempts,
                        ?pause,
                        error = %err,
                        "identity refresh failed; retrying"
                    );
                    tokio::time::sleep(pause).await;
                }
                Err(err) => {
                    warn!(attempt, error = %err, "identity refresh failed");
                    return Err(err);
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
            // Still inside the window right after a refresh: back off
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
        debug!(?delay, "identity proactive refresh armed");
    }

    async fn run_proactive(self: &Arc<Self>) {
        if self.cache.get().is_none() {
            return;
        }
        match self.refresh_shared(self.config.max_attempts).await {
            Ok(_) => {}
            Err(err) if err.is_fatal_to_session() => {
                info!("identity session ended; proactive refresh stopped");
            }
            Err(err) => {
                warn!(error = %err, "proactive identity refresh failed; retrying in one minute");
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
        debug!("identity token expiring soon; validating");
        match self.refresh_shared(self.config.max_attempts).await {
            Ok(_) => {}
            Err(err) if err.is_fatal_to_session() => {}
            Err(err) => {
                warn!(error = %err, "validation refresh failed; re-reading cookie store");
                if let Err(err) = self.hydrate().await {
                    warn!(error = %err, "identity cookie re-read failed");
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

fn ends_session(err: &AuthError) -> bool {
    err.is_fatal_to_session() || err.status_code() == Some(401)
}

#[async_trait]
impl AccessTokenProvider for IdentityTokenLifecycle {
    async fn access_token(&self) -> Result<String, AuthError> {
        self.ensure_access_token(EnsureTokenOptions::default()).await
    }
}

impl std::fmt::Debug for IdentityTokenLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityTokenLifecycle")
            .field("cache", &self.inner.cache)
            .field("refresh_in_flight", &self.inner.refresh_flight.is_in_flight())
            .finish_non_exhaustive()
    }
}
