//! Top-level authentication state machine
//!
//! ```text
//! idle ──initialize──► initializing ──► authenticated | unauthenticated
//!                                 ▲                │
//!            re_authenticate ─────┘     check_and_restore ──► checking ──┘
//! ```
//!
//! The identity session is always restored before the OAuth credential,
//! since the OAuth backend proxy only accepts identity-authorised calls.
//! `initialize` and `check_and_restore` are each single-flight and each
//! debounced: a call within two seconds of the previous completed call
//! returns the last known result without touching the network.
//!
//! `is_loading` is derived from a count of running operations, so it stays
//! set until the last of an overlapping `initialize` and check settles.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chatlab_common::error::ErrorClassification;
use chatlab_common::events::{EventBus, Subscription};
use chatlab_common::sync::{DebounceWindow, SingleFlight};
use chatlab_domain::constants::{
    AUTH_DEBOUNCE_MS, AUTH_RESTORE_ATTEMPTS, AUTH_RESTORE_RETRY_PAUSE_MS,
};
use chatlab_domain::{AuthPhase, AuthStatus};
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use super::error::AuthError;
use super::identity::IdentityTokenLifecycle;
use super::oauth::OAuthTokenLifecycle;

/// Names of the events published by [`AuthCoordinator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthEventKind {
    /// Transition into the authenticated state
    AuthRestored,
    /// Transition out of the authenticated state, or a failed restore
    AuthLost,
    /// Any change of the derived status
    AuthChanged,
}

chatlab_domain::impl_domain_enum_conversions!(AuthEventKind {
    AuthRestored => "auth-restored",
    AuthLost => "auth-lost",
    AuthChanged => "auth-changed",
});

/// Payload delivered to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub status: AuthStatus,
}

/// Sequences both token lifecycles and publishes the derived status
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct AuthCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    identity: IdentityTokenLifecycle,
    oauth: OAuthTokenLifecycle,
    phase: RwLock<AuthPhase>,
    status_tx: watch::Sender<AuthStatus>,
    init_flight: SingleFlight<AuthStatus>,
    check_flight: SingleFlight<bool>,
    init_debounce: DebounceWindow,
    check_debounce: DebounceWindow,
    last_check_result: AtomicBool,
    running: AtomicUsize,
    events: EventBus<AuthEventKind, AuthEvent>,
}

impl AuthCoordinator {
    #[must_use]
    pub fn new(identity: IdentityTokenLifecycle, oauth: OAuthTokenLifecycle) -> Self {
        let (status_tx, _) = watch::channel(AuthStatus::default());
        let debounce = Duration::from_millis(AUTH_DEBOUNCE_MS);

        Self {
            inner: Arc::new(Inner {
                identity,
                oauth,
                phase: RwLock::new(AuthPhase::Idle),
                status_tx,
                init_flight: SingleFlight::new("auth-initialize"),
                check_flight: SingleFlight::new("auth-check"),
                init_debounce: DebounceWindow::new(debounce),
                check_debounce: DebounceWindow::new(debounce),
                last_check_result: AtomicBool::new(false),
                running: AtomicUsize::new(0),
                events: EventBus::new("auth-events"),
            }),
        }
    }

    /// Restore identity, then OAuth, then the profile, and publish
    ///
    /// Concurrent calls share one run; a call within the debounce window of
    /// the previous completed run returns the current status.
    pub async fn initialize(&self) -> AuthStatus {
        if self.inner.init_debounce.should_skip() && !self.inner.init_flight.is_in_flight() {
            debug!("initialize debounced");
            return self.get_auth_status();
        }

        let inner = Arc::clone(&self.inner);
        self.inner.init_flight.run(move || async move { inner.run_initialize().await }).await
    }

    /// Make sure the session is usable, restoring the OAuth credential if
    /// needed
    ///
    /// Returns `true` immediately when already authenticated and `false`
    /// without side effects while an `initialize` is running.
    pub async fn check_and_restore(&self) -> bool {
        if self.inner.init_flight.is_in_flight() {
            debug!("initialize in progress; check skipped");
            return false;
        }
        if *self.inner.phase.read() == AuthPhase::Authenticated
            && self.inner.oauth.is_authenticated()
        {
            return true;
        }
        if self.inner.check_debounce.should_skip() && !self.inner.check_flight.is_in_flight() {
            debug!("check_and_restore debounced");
            return self.inner.last_check_result.load(Ordering::SeqCst);
        }

        let inner = Arc::clone(&self.inner);
        self.inner.check_flight.run(move || async move { inner.run_check().await }).await
    }

    /// Force a fresh `initialize` after a user-driven reconnect
    ///
    /// Waits for a running initialize, stops both lifecycles' timers and
    /// bypasses the debounce.
    #[instrument(skip(self), name = "auth.re_authenticate")]
    pub async fn re_authenticate(&self) -> AuthStatus {
        let _ = self.inner.init_flight.join().await;
        self.inner.identity.shutdown();
        self.inner.oauth.shutdown();
        self.inner.init_debounce.reset();
        self.inner.check_debounce.reset();
        self.initialize().await
    }

    /// Sign out of both lifecycles and publish `auth-lost`
    #[instrument(skip(self), name = "auth.clear")]
    pub async fn clear_auth(&self) {
        if let Err(err) = self.inner.oauth.logout().await {
            warn!(error = %err, "oauth logout failed");
        }
        if let Err(err) = self.inner.identity.clear().await {
            warn!(error = %err, "identity clear failed");
        }
        self.inner.init_debounce.reset();
        self.inner.check_debounce.reset();
        self.inner.last_check_result.store(false, Ordering::SeqCst);

        *self.inner.phase.write() = AuthPhase::Unauthenticated;
        let status = AuthStatus {
            is_loading: self.inner.running.load(Ordering::SeqCst) > 0,
            ..AuthStatus::default()
        };
        let previous = self.inner.status_tx.send_replace(status.clone());
        self.inner.emit(AuthEventKind::AuthLost, &status);
        if settled_view(&previous) != settled_view(&status) {
            self.inner.emit(AuthEventKind::AuthChanged, &status);
        }
        info!("authentication cleared");
    }

    /// Current derived status
    #[must_use]
    pub fn get_auth_status(&self) -> AuthStatus {
        self.inner.status_tx.borrow().clone()
    }

    /// Whether an `initialize` or `check_and_restore` is running
    #[must_use]
    pub fn is_operation_in_progress(&self) -> bool {
        self.inner.init_flight.is_in_flight() || self.inner.check_flight.is_in_flight()
    }

    /// Receiver that observes every published status
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<AuthStatus> {
        self.inner.status_tx.subscribe()
    }

    #[must_use]
    pub fn phase(&self) -> AuthPhase {
        *self.inner.phase.read()
    }

    /// Register `callback` for `kind`
    ///
    /// A panicking callback is logged and does not affect other
    /// subscribers. Dropping the returned handle keeps the callback
    /// registered; call [`Subscription::unsubscribe`] to remove it.
    pub fn subscribe<F>(&self, kind: AuthEventKind, callback: F) -> Subscription
    where
        F: Fn(&AuthEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(kind, callback)
    }
}

impl Inner {
    #[instrument(skip_all, name = "auth.initialize")]
    async fn run_initialize(self: Arc<Self>) -> AuthStatus {
        self.enter(AuthPhase::Initializing);
        let outcome = self.restore_session().await;
        let status = self.settle(AuthPhase::Initializing, outcome);
        self.init_debounce.mark_completed();
        status
    }

    #[instrument(skip_all, name = "auth.check_and_restore")]
    async fn run_check(self: Arc<Self>) -> bool {
        self.enter(AuthPhase::Checking);
        let outcome = self.restore_oauth_only().await;
        let status = self.settle(AuthPhase::Checking, outcome);

        let authenticated = status.is_authenticated;
        self.last_check_result.store(authenticated, Ordering::SeqCst);
        self.check_debounce.mark_completed();
        authenticated
    }

    async fn restore_session(&self) -> Result<bool, AuthError> {
        if !self.identity.load().await? {
            debug!("no identity session; skipping oauth restore");
            return Ok(false);
        }

        if self.oauth.load_persisted().await? && self.oauth.has_fresh_credential() {
            debug!("persisted oauth credential still fresh");
        } else {
            self.restore_with_retry().await?;
        }
        self.ensure_profile().await;
        Ok(true)
    }

    async fn restore_oauth_only(&self) -> Result<bool, AuthError> {
        if !self.identity.is_authenticated() && !self.identity.load().await? {
            return Ok(false);
        }
        if !self.oauth.has_fresh_credential() {
            self.restore_with_retry().await?;
        }
        self.ensure_profile().await;
        Ok(true)
    }

    /// Refresh a held credential, or restore one from the cookie companion
    async fn restore_with_retry(&self) -> Result<(), AuthError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = if self.oauth.is_authenticated() {
                self.oauth.refresh().await
            } else {
                self.oauth.restore_from_cookie().await
            };
            match result {
                Ok(_) => return Ok(()),
                Err(err) if attempt < AUTH_RESTORE_ATTEMPTS && err.is_retryable() => {
                    warn!(attempt, error = %err, "oauth restore failed; retrying");
                    tokio::time::sleep(Duration::from_millis(AUTH_RESTORE_RETRY_PAUSE_MS)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn ensure_profile(&self) {
        if self.oauth.user_profile().is_some() {
            return;
        }
        if let Err(err) = self.oauth.fetch_user_profile().await {
            warn!(error = %err, "user profile fetch failed");
        }
    }

    fn enter(&self, phase: AuthPhase) {
        self.running.fetch_add(1, Ordering::SeqCst);
        *self.phase.write() = phase;
        self.status_tx.send_modify(|status| status.is_loading = true);
        debug!(%phase, "auth operation started");
    }

    /// Publish the outcome of a restore and emit the transition events
    ///
    /// `is_loading` stays set while the other operation is still running,
    /// and a check settling under a running initialize leaves the phase at
    /// `Initializing`.
    fn settle(&self, source: AuthPhase, outcome: Result<bool, AuthError>) -> AuthStatus {
        let still_running = self.running.fetch_sub(1, Ordering::SeqCst) > 1;
        let (phase, mut status) = match outcome {
            Ok(true) => (
                AuthPhase::Authenticated,
                AuthStatus {
                    is_authenticated: true,
                    is_loading: false,
                    user: self.oauth.user_profile(),
                    error: None,
                },
            ),
            Ok(false) => (AuthPhase::Unauthenticated, AuthStatus::default()),
            // The session is simply gone; nothing to report
            Err(AuthError::AuthenticationRequired(reason)) => {
                debug!(%reason, "restore found no usable session");
                (AuthPhase::Unauthenticated, AuthStatus::default())
            }
            Err(err) => {
                warn!(error = %err, "authentication restore failed");
                (
                    AuthPhase::Unauthenticated,
                    AuthStatus { error: Some(err.to_string()), ..AuthStatus::default() },
                )
            }
        };

        status.is_loading = still_running;
        let overtaken = still_running
            && source == AuthPhase::Checking
            && self.init_flight.is_in_flight();
        if !overtaken {
            *self.phase.write() = phase;
        }
        let previous = self.status_tx.send_replace(status.clone());

        if status.is_authenticated && !previous.is_authenticated {
            self.emit(AuthEventKind::AuthRestored, &status);
        } else if !status.is_authenticated
            && (previous.is_authenticated || status.error.is_some())
        {
            self.emit(AuthEventKind::AuthLost, &status);
        }
        if settled_view(&previous) != settled_view(&status) {
            self.emit(AuthEventKind::AuthChanged, &status);
        }

        info!(%phase, authenticated = status.is_authenticated, "auth state settled");
        status
    }

    fn emit(&self, kind: AuthEventKind, status: &AuthStatus) {
        let event = AuthEvent { kind, status: status.clone() };
        let delivered = self.events.emit(&kind, &event);
        debug!(event = %kind, delivered, "auth event published");
    }
}

fn settled_view(status: &AuthStatus) -> (bool, Option<&str>, Option<&str>) {
    (
        status.is_authenticated,
        status.user.as_ref().map(|user| user.id.as_str()),
        status.error.as_deref(),
    )
}

impl std::fmt::Debug for AuthCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthCoordinator")
            .field("phase", &self.phase())
            .field("in_progress", &self.is_operation_in_progress())
            .finish_non_exhaustive()
    }
}
