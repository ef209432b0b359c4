//! Port interfaces for sync operations

use async_trait::async_trait;
use chatlab_domain::{RemoteObject, Result, SyncReport};

use super::error::SyncError;

/// Named blobs in the per-user, app-scoped remote folder
///
/// Every call is authorised with a Google access token obtained by the
/// caller right before the call.
#[async_trait]
pub trait RemoteObjectStore: Send + Sync {
    /// List every object in the folder
    async fn list(&self, access_token: &str) -> Result<Vec<RemoteObject>>;

    /// Create or replace `name`
    async fn upload(&self, access_token: &str, name: &str, bytes: Vec<u8>)
        -> Result<RemoteObject>;

    /// Read `name`; `None` when it does not exist
    async fn download(&self, access_token: &str, name: &str) -> Result<Option<Vec<u8>>>;

    /// Delete `name`, returning whether it existed
    async fn delete(&self, access_token: &str, name: &str) -> Result<bool>;
}

/// The local database holding conversations, contexts and prompts
#[async_trait]
pub trait LocalDatabase: Send + Sync {
    /// Serialise the full local state
    async fn export_snapshot(&self) -> Result<Vec<u8>>;

    /// Merge a snapshot produced by [`LocalDatabase::export_snapshot`]
    async fn import_snapshot(&self, bytes: &[u8]) -> Result<()>;

    /// Number of local changes not yet confirmed remotely
    async fn count_pending_changes(&self) -> Result<u64>;

    /// Clear the pending markers after a confirmed upload
    async fn mark_synced(&self) -> Result<()>;
}

/// One full sync, as scheduled by [`super::auto_sync::SmartAutoSync`]
#[async_trait]
pub trait SyncOperation: Send + Sync {
    async fn sync(&self) -> std::result::Result<SyncReport, SyncError>;
}

/// Advisory prompt shown before the process or window goes away while
/// local changes are unsynced
pub trait UnloadGuard: Send + Sync {
    /// Ask for confirmation before unloading, showing `message`
    fn engage(&self, message: &'static str);

    /// Stop asking
    fn release(&self);
}
