//! Runtime assembly
//!
//! Turns an [`AppConfig`] into [`CorePorts`] backed by the HTTP adapters and
//! the configured state store. The remote object store and local database
//! belong to the embedding application, so callers pass them in.

use std::sync::Arc;

use chatlab_common::time::{Clock, SystemClock};
use chatlab_core::{
    CoreContext, CorePorts, LocalDatabase, RemoteObjectStore, StateStore, UnloadGuard,
};
use chatlab_domain::{AppConfig, Result};
use tracing::info;

use crate::http::{GoogleOAuthProvider, HttpClient, HttpIdentityBackend, HttpOAuthBackend};
use crate::storage::{FileStateStore, MemoryStateStore};
use crate::sync::{InMemoryDatabase, InMemoryObjectStore};

/// Application-owned sync backends
#[derive(Clone)]
pub struct SyncBackends {
    pub remote_store: Arc<dyn RemoteObjectStore>,
    pub database: Arc<dyn LocalDatabase>,
    pub unload_guard: Option<Arc<dyn UnloadGuard>>,
}

impl SyncBackends {
    /// In-memory store and database, for demos and tests
    #[must_use]
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self {
            remote_store: Arc::new(InMemoryObjectStore::new(clock)),
            database: Arc::new(InMemoryDatabase::new()),
            unload_guard: None,
        }
    }
}

/// State store selected by `config.storage`
#[must_use]
pub fn state_store(config: &AppConfig) -> Arc<dyn StateStore> {
    match &config.storage.state_path {
        Some(path) => Arc::new(FileStateStore::new(path)),
        None => Arc::new(MemoryStateStore::new()),
    }
}

/// Build the core ports for `config`
///
/// One HTTP client (and therefore one cookie jar) is shared by the identity
/// backend, the OAuth proxy and the Google endpoints.
///
/// # Errors
/// Returns `ChatLabError::Config` when an endpoint URL is invalid or the
/// HTTP client cannot be built.
pub fn build_ports(
    config: &AppConfig,
    backends: SyncBackends,
    clock: Arc<dyn Clock>,
) -> Result<CorePorts> {
    let client = HttpClient::from_config(&config.endpoints)?;
    let endpoints = &config.endpoints;

    let identity_backend = HttpIdentityBackend::new(
        client.clone(),
        &endpoints.identity_base_url,
        config.environment,
    )?;
    let oauth_backend =
        HttpOAuthBackend::new(client.clone(), &endpoints.oauth_proxy_base_url, config.environment)?;
    let oauth_provider = GoogleOAuthProvider::new(client, endpoints)?;

    Ok(CorePorts {
        identity_backend: Arc::new(identity_backend),
        oauth_backend: Arc::new(oauth_backend),
        oauth_provider: Arc::new(oauth_provider),
        remote_store: backends.remote_store,
        database: backends.database,
        state_store: state_store(config),
        unload_guard: backends.unload_guard,
        clock,
    })
}

/// Build a [`CoreContext`] on the system clock
///
/// # Errors
/// Same as [`build_ports`].
pub fn build_context(config: AppConfig, backends: SyncBackends) -> Result<CoreContext> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ports = build_ports(&config, backends, clock)?;

    info!(
        environment = config.environment.as_str(),
        persistent_state = config.storage.state_path.is_some(),
        direct_fallback = config.direct_fallback_enabled(),
        "core context assembled"
    );
    Ok(CoreContext::new(config, ports))
}
