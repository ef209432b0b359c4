//! Core context - constructs and wires every component once
//!
//! Replaces process-wide singletons: the application builds one
//! [`CoreContext`] at start-up and hands clones of its components to
//! whoever needs them. Tests build as many isolated contexts as they like.

use std::sync::Arc;

use chatlab_common::time::Clock;
use chatlab_domain::{AppConfig, AuthStatus, AutoSyncConfig, SyncSettings};
use tracing::{info, instrument, warn};

use crate::auth::coordinator::AuthCoordinator;
use crate::auth::identity::IdentityTokenLifecycle;
use crate::auth::oauth::{OAuthPorts, OAuthTokenLifecycle};
use crate::auth::ports::{AccessTokenProvider, IdentityBackend, OAuthBackend, OAuthProvider};
use crate::state_ports::StateStore;
use crate::sync::auto_sync::SmartAutoSync;
use crate::sync::error::SyncError;
use crate::sync::ports::{LocalDatabase, RemoteObjectStore, SyncOperation, UnloadGuard};
use crate::sync::service::DriveSyncService;
use crate::sync::settings::SyncSettingsStore;
use crate::sync::tracker::UnsyncedChangeTracker;

/// External collaborators the core is built on
#[derive(Clone)]
pub struct CorePorts {
    pub identity_backend: Arc<dyn IdentityBackend>,
    pub oauth_backend: Arc<dyn OAuthBackend>,
    pub oauth_provider: Arc<dyn OAuthProvider>,
    pub remote_store: Arc<dyn RemoteObjectStore>,
    pub database: Arc<dyn LocalDatabase>,
    pub state_store: Arc<dyn StateStore>,
    pub unload_guard: Option<Arc<dyn UnloadGuard>>,
    pub clock: Arc<dyn Clock>,
}

/// Every core component, wired together
pub struct CoreContext {
    pub config: AppConfig,
    pub identity: IdentityTokenLifecycle,
    pub oauth: OAuthTokenLifecycle,
    pub auth: AuthCoordinator,
    pub tracker: Arc<UnsyncedChangeTracker>,
    pub sync_service: Arc<DriveSyncService>,
    pub auto_sync: SmartAutoSync,
    pub settings: SyncSettingsStore,
}

impl CoreContext {
    /// Wire the components; nothing runs until [`CoreContext::start`]
    #[must_use]
    pub fn new(config: AppConfig, ports: CorePorts) -> Self {
        let identity = IdentityTokenLifecycle::new(
            ports.identity_backend,
            Arc::clone(&ports.clock),
            config.identity,
        );

        let oauth = OAuthTokenLifecycle::new(
            config.oauth.clone(),
            config.direct_fallback_enabled(),
            OAuthPorts {
                backend: ports.oauth_backend,
                provider: ports.oauth_provider,
                identity: Arc::new(identity.clone()),
                store: Arc::clone(&ports.state_store),
                clock: Arc::clone(&ports.clock),
            },
        );

        let auth = AuthCoordinator::new(identity.clone(), oauth.clone());

        let tracker = match ports.unload_guard {
            Some(guard) => UnsyncedChangeTracker::new().with_unload_guard(guard),
            None => UnsyncedChangeTracker::new(),
        };
        let tracker = Arc::new(tracker);

        let oauth_tokens: Arc<dyn AccessTokenProvider> = Arc::new(oauth.clone());
        let sync_service = Arc::new(DriveSyncService::new(
            oauth_tokens,
            ports.remote_store,
            ports.database,
            Arc::clone(&ports.state_store),
            Arc::clone(&ports.clock),
        ));

        let operation: Arc<dyn SyncOperation> = sync_service.clone();
        let auto_sync =
            SmartAutoSync::new(Arc::clone(&tracker), operation, ports.clock, config.auto_sync);

        let settings = SyncSettingsStore::new(ports.state_store);

        Self { config, identity, oauth, auth, tracker, sync_service, auto_sync, settings }
    }

    /// Apply saved settings, restore authentication and enable auto-sync
    ///
    /// Unreadable settings fall back to the configured delay; the returned
    /// status says whether the user is signed in.
    #[instrument(skip(self), name = "core.start")]
    pub async fn start(&self) -> AuthStatus {
        match self.settings.load().await {
            Ok(settings) => self.apply_settings(&settings),
            Err(err) => warn!(error = %err, "sync settings unavailable; using configured delay"),
        }

        let status = self.auth.initialize().await;
        self.auto_sync.enable();

        info!(
            authenticated = status.is_authenticated,
            delay_minutes = self.auto_sync.config().delay_minutes,
            "core started"
        );
        status
    }

    /// Persist a new auto-sync delay and apply it to the scheduler
    ///
    /// # Errors
    ///
    /// `SyncError::Storage` when the settings cannot be saved; the scheduler
    /// keeps its previous delay in that case.
    pub async fn update_sync_delay(&self, minutes: u32) -> Result<(), SyncError> {
        let settings = SyncSettings::with_delay(minutes);
        self.settings.save(&settings).await?;
        self.apply_settings(&settings);
        Ok(())
    }

    fn apply_settings(&self, settings: &SyncSettings) {
        let config = AutoSyncConfig {
            delay_minutes: settings.auto_sync_delay_minutes,
            ..self.auto_sync.config()
        };
        self.auto_sync.update_config(config);
    }

    /// Cancel every timer; in-flight network calls are left to settle
    pub fn shutdown(&self) {
        self.auto_sync.disable();
        self.oauth.shutdown();
        self.identity.shutdown();
        info!("core shut down");
    }
}

impl std::fmt::Debug for CoreContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreContext")
            .field("environment", &self.config.environment)
            .field("auth", &self.auth.get_auth_status())
            .field("auto_sync", &self.auto_sync)
            .finish_non_exhaustive()
    }
}
