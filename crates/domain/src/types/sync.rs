//! Auto-sync state, status and settings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_AUTO_SYNC_DELAY_MINUTES, LEGACY_AUTO_SYNC_DELAY_MINUTES, SYNC_SETTINGS_VERSION,
};

/// Scheduler bookkeeping for the delayed, retryable auto-sync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncAttemptState {
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub next_scheduled_at: Option<DateTime<Utc>>,
}

impl SyncAttemptState {
    /// Forget retries and any scheduled attempt, keeping the last attempt time
    pub fn reset(&mut self) {
        self.retry_count = 0;
        self.next_scheduled_at = None;
    }
}

/// Auto-sync read model for countdown and health display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub enabled: bool,
    pub is_dirty: bool,
    pub in_progress: bool,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub next_scheduled_at: Option<DateTime<Utc>>,
    /// Whole seconds until the next scheduled attempt, never negative
    pub countdown_seconds: u64,
}

/// Outcome of one successful full sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub pending_before: u64,
    pub uploaded_bytes: usize,
    pub imported_remote: bool,
    pub completed_at: DateTime<Utc>,
}

/// Metadata of a blob in the remote object store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    pub name: String,
    pub size_bytes: u64,
    pub modified_at: DateTime<Utc>,
}

/// Versioned user settings for auto-sync
///
/// The default delay changed from one minute to five. Settings written
/// before that change that still carry the old default are moved to the new
/// one; any explicit choice above the old default is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "legacy_version")]
    pub version: u32,
    pub auto_sync_delay_minutes: u32,
}

fn legacy_version() -> u32 {
    1
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::with_delay(DEFAULT_AUTO_SYNC_DELAY_MINUTES)
    }
}

impl SyncSettings {
    #[must_use]
    pub fn with_delay(minutes: u32) -> Self {
        Self { version: SYNC_SETTINGS_VERSION, auto_sync_delay_minutes: minutes }
    }

    /// Bring settings to the current version
    ///
    /// Returns the migrated settings and whether anything changed.
    #[must_use]
    pub fn migrate(self) -> (Self, bool) {
        if self.version >= SYNC_SETTINGS_VERSION {
            return (self, false);
        }

        let delay = if self.auto_sync_delay_minutes <= LEGACY_AUTO_SYNC_DELAY_MINUTES {
            DEFAULT_AUTO_SYNC_DELAY_MINUTES
        } else {
            self.auto_sync_delay_minutes
        };
        (Self::with_delay(delay), true)
    }
}
