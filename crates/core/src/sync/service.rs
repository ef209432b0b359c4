//! Full sync between the local database and the remote app folder
//!
//! One run: fresh OAuth token, pull and merge the remote snapshot when one
//! exists, push the merged local snapshot, clear pending markers, record
//! the completion time.

use std::sync::Arc;

use async_trait::async_trait;
use chatlab_common::time::Clock;
use chatlab_domain::constants::{KEY_LAST_FULL_SYNC, REMOTE_SNAPSHOT_NAME};
use chatlab_domain::SyncReport;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use super::error::SyncError;
use super::ports::{LocalDatabase, RemoteObjectStore, SyncOperation};
use crate::auth::ports::AccessTokenProvider;
use crate::state_ports::StateStore;

/// Sync operation backed by the remote object store
pub struct DriveSyncService {
    tokens: Arc<dyn AccessTokenProvider>,
    remote: Arc<dyn RemoteObjectStore>,
    database: Arc<dyn LocalDatabase>,
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    snapshot_name: String,
}

impl DriveSyncService {
    #[must_use]
    pub fn new(
        tokens: Arc<dyn AccessTokenProvider>,
        remote: Arc<dyn RemoteObjectStore>,
        database: Arc<dyn LocalDatabase>,
        store: Arc<dyn StateStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tokens,
            remote,
            database,
            store,
            clock,
            snapshot_name: REMOTE_SNAPSHOT_NAME.to_string(),
        }
    }

    /// Use a different remote object name for the workspace snapshot
    #[must_use]
    pub fn with_snapshot_name(mut self, name: impl Into<String>) -> Self {
        self.snapshot_name = name.into();
        self
    }

    #[must_use]
    pub fn snapshot_name(&self) -> &str {
        &self.snapshot_name
    }

    /// Perform one full sync
    ///
    /// # Errors
    ///
    /// `SyncError::Auth` when no access token can be obtained, `Remote` and
    /// `Local` for object store and database failures. A failure to record
    /// the completion time is logged and does not fail the sync.
    #[instrument(skip(self), name = "drive_sync.sync", fields(snapshot = %self.snapshot_name))]
    pub async fn sync(&self) -> Result<SyncReport, SyncError> {
        let token = self.tokens.access_token().await?;
        let pending_before =
            self.database.count_pending_changes().await.map_err(SyncError::local)?;

        let imported_remote = self.pull(&token).await?;

        let snapshot = self.database.export_snapshot().await.map_err(SyncError::local)?;
        let uploaded_bytes = snapshot.len();
        self.remote
            .upload(&token, &self.snapshot_name, snapshot)
            .await
            .map_err(SyncError::remote)?;

        self.database.mark_synced().await.map_err(SyncError::local)?;

        let completed_at = self.clock.now_utc();
        if let Err(err) = self.store.set(KEY_LAST_FULL_SYNC, completed_at.to_rfc3339()).await {
            warn!(error = %err, "failed to record last full sync time");
        }

        info!(pending_before, uploaded_bytes, imported_remote, "full sync completed");
        Ok(SyncReport { pending_before, uploaded_bytes, imported_remote, completed_at })
    }

    async fn pull(&self, token: &str) -> Result<bool, SyncError> {
        let objects = self.remote.list(token).await.map_err(SyncError::remote)?;
        if !objects.iter().any(|object| object.name == self.snapshot_name) {
            debug!("no remote snapshot yet");
            return Ok(false);
        }

        let Some(bytes) =
            self.remote.download(token, &self.snapshot_name).await.map_err(SyncError::remote)?
        else {
            // listed but gone by the time we asked
            return Ok(false);
        };

        self.database.import_snapshot(&bytes).await.map_err(SyncError::local)?;
        debug!(bytes = bytes.len(), "remote snapshot merged");
        Ok(true)
    }

    /// Completion time of the last successful full sync
    ///
    /// # Errors
    ///
    /// `SyncError::Storage` when the state store cannot be read. An
    /// unparsable timestamp is treated as absent.
    pub async fn last_full_sync(&self) -> Result<Option<DateTime<Utc>>, SyncError> {
        let Some(raw) = self.store.get(KEY_LAST_FULL_SYNC).await.map_err(SyncError::storage)?
        else {
            return Ok(None);
        };

        match DateTime::parse_from_rfc3339(&raw) {
            Ok(at) => Ok(Some(at.with_timezone(&Utc))),
            Err(err) => {
                warn!(error = %err, "discarding unparsable last full sync time");
                Ok(None)
            }
        }
    }

    /// Delete the remote snapshot and forget the last sync time
    ///
    /// Returns whether a remote snapshot existed.
    ///
    /// # Errors
    ///
    /// `Auth`, `Remote` or `Storage` as for [`DriveSyncService::sync`].
    #[instrument(skip(self), name = "drive_sync.purge_remote")]
    pub async fn purge_remote(&self) -> Result<bool, SyncError> {
        let token = self.tokens.access_token().await?;
        let existed = self
            .remote
            .delete(&token, &self.snapshot_name)
            .await
            .map_err(SyncError::remote)?;
        self.store.remove(KEY_LAST_FULL_SYNC).await.map_err(SyncError::storage)?;
        info!(existed, "remote snapshot purged");
        Ok(existed)
    }
}

#[async_trait]
impl SyncOperation for DriveSyncService {
    async fn sync(&self) -> Result<SyncReport, SyncError> {
        DriveSyncService::sync(self).await
    }
}

impl std::fmt::Debug for DriveSyncService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveSyncService")
            .field("snapshot_name", &self.snapshot_name)
            .finish_non_exhaustive()
    }
}
