//! # Chat Lab Core
//!
//! The auth-and-sync coordination core - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces (traits) for every external collaborator
//! - The two token lifecycles and the auth coordinator
//! - The unsynced-change tracker, smart auto-sync and the Drive sync operation
//! - [`CoreContext`], which wires everything once at start-up
//!
//! ## Architecture Principles
//! - Only depends on `chatlab-common` and `chatlab-domain`
//! - No HTTP, filesystem or platform code
//! - All external dependencies via traits
//! - Time through `chatlab_common::time::Clock` so schedules are testable

pub mod auth;
pub mod context;
pub mod sync;

// Infrastructure ports
pub mod state_ports;

pub use auth::coordinator::{AuthCoordinator, AuthEvent, AuthEventKind};
pub use auth::error::{AuthError, UserAction};
pub use auth::identity::{EnsureTokenOptions, IdentityTokenLifecycle};
pub use auth::oauth::{OAuthPorts, OAuthTokenLifecycle};
pub use auth::ports::{
    AccessTokenProvider, ClientCredentials, IdentityBackend, OAuthBackend, OAuthProvider,
};
pub use auth::token_cache::TokenCache;
pub use context::{CoreContext, CorePorts};
pub use state_ports::StateStore;
pub use sync::auto_sync::SmartAutoSync;
pub use sync::error::SyncError;
pub use sync::ports::{LocalDatabase, RemoteObjectStore, SyncOperation, UnloadGuard};
pub use sync::service::DriveSyncService;
pub use sync::settings::SyncSettingsStore;
pub use sync::tracker::UnsyncedChangeTracker;
