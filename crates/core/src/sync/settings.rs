//! Persisted auto-sync settings

use std::sync::Arc;

use chatlab_domain::constants::KEY_SYNC_SETTINGS;
use chatlab_domain::SyncSettings;
use tracing::info;

use super::error::SyncError;
use crate::state_ports::{load_json, save_json, StateStore};

/// Loads, migrates and saves [`SyncSettings`]
#[derive(Clone)]
pub struct SyncSettingsStore {
    store: Arc<dyn StateStore>,
}

impl SyncSettingsStore {
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Current settings, migrated to the latest version
    ///
    /// Missing or undecodable settings yield the defaults without writing
    /// anything; migrated settings are written back.
    ///
    /// # Errors
    ///
    /// `SyncError::Storage` when the state store fails.
    pub async fn load(&self) -> Result<SyncSettings, SyncError> {
        let stored: Option<SyncSettings> =
            load_json(self.store.as_ref(), KEY_SYNC_SETTINGS).await.map_err(SyncError::storage)?;
        let Some(stored) = stored else {
            return Ok(SyncSettings::default());
        };

        let (settings, changed) = stored.migrate();
        if changed {
            info!(
                from_version = stored.version,
                to_version = settings.version,
                delay_minutes = settings.auto_sync_delay_minutes,
                "sync settings migrated"
            );
            self.save(&settings).await?;
        }
        Ok(settings)
    }

    /// # Errors
    ///
    /// `SyncError::Storage` when the state store fails.
    pub async fn save(&self, settings: &SyncSettings) -> Result<(), SyncError> {
        save_json(self.store.as_ref(), KEY_SYNC_SETTINGS, settings)
            .await
            .map_err(SyncError::storage)
    }
}

impl std::fmt::Debug for SyncSettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSettingsStore").finish_non_exhaustive()
    }
}
