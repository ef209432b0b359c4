//! Domain types and models
//!
//! - [`auth`]: credentials, profiles and the derived auth status
//! - [`sync`]: auto-sync attempt state, status read model and settings

pub mod auth;
pub mod sync;

pub use auth::{
    AuthPhase, AuthStatus, AuthorizationRequest, Credential, CredentialOrigin,
    PendingAuthorization, TokenGrant, UserProfile,
};
pub use sync::{RemoteObject, SyncAttemptState, SyncReport, SyncSettings, SyncStatus};
