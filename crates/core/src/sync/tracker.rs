//! Process-wide "unsynced local changes" flag
//!
//! Deliberately coarse: one boolean for the whole workspace. Listeners only
//! hear true transitions, so repeated `mark_dirty` calls from every write
//! path cost nothing.
//!
//! Every `mark_dirty` also bumps a revision, even when the flag is already
//! set. A sync reads the revision before it starts and clears the flag with
//! [`UnsyncedChangeTracker::mark_synced_through`], which leaves it set when
//! a mutation landed while the sync was running.

use std::sync::Arc;

use chatlab_common::events::{Listeners, Subscription};
use parking_lot::Mutex;
use tracing::debug;

use super::ports::UnloadGuard;

/// Prompt shown by the unload guard while changes are unsynced
pub const UNSYNCED_CHANGES_PROMPT: &str =
    "You have unsynced changes. Are you sure you want to leave?";

#[derive(Debug, Default)]
struct FlagState {
    dirty: bool,
    revision: u64,
}

/// Dirty flag with listener fan-out and an unload guard
pub struct UnsyncedChangeTracker {
    state: Mutex<FlagState>,
    listeners: Listeners<bool>,
    unload_guard: Option<Arc<dyn UnloadGuard>>,
}

impl UnsyncedChangeTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FlagState::default()),
            listeners: Listeners::new("unsynced-changes"),
            unload_guard: None,
        }
    }

    /// Engage `guard` on every clean→dirty transition and release it on
    /// every dirty→clean transition
    #[must_use]
    pub fn with_unload_guard(mut self, guard: Arc<dyn UnloadGuard>) -> Self {
        self.unload_guard = Some(guard);
        self
    }

    /// Record that a local mutation has not reached remote storage
    ///
    /// Returns whether this call changed the flag.
    pub fn mark_dirty(&self) -> bool {
        let was_dirty = {
            let mut state = self.state.lock();
            state.revision += 1;
            std::mem::replace(&mut state.dirty, true)
        };
        if was_dirty {
            return false;
        }
        debug!("local changes pending sync");
        if let Some(guard) = &self.unload_guard {
            guard.engage(UNSYNCED_CHANGES_PROMPT);
        }
        self.listeners.emit(&true);
        true
    }

    /// Record that every local change is persisted remotely
    ///
    /// Returns whether this call changed the flag.
    pub fn mark_clean(&self) -> bool {
        if !std::mem::take(&mut self.state.lock().dirty) {
            return false;
        }
        self.notify_clean();
        true
    }

    /// Mark clean only if nothing was marked dirty after `revision` was read
    ///
    /// Returns `false`, leaving the flag set, when a newer mutation exists.
    pub fn mark_synced_through(&self, revision: u64) -> bool {
        let cleared = {
            let mut state = self.state.lock();
            if state.revision != revision {
                debug!(revision, latest = state.revision, "changes recorded during sync");
                return false;
            }
            std::mem::take(&mut state.dirty)
        };
        if cleared {
            self.notify_clean();
        }
        true
    }

    /// Count of `mark_dirty` calls so far
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.state.lock().revision
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    /// Listen for transitions; the callback receives the new flag value
    pub fn add_listener<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&bool) + Send + Sync + 'static,
    {
        self.listeners.add(callback)
    }

    fn notify_clean(&self) {
        debug!("local changes synced");
        if let Some(guard) = &self.unload_guard {
            guard.release();
        }
        self.listeners.emit(&false);
    }

    /// Confirmation prompt to show before unloading, if any
    #[must_use]
    pub fn before_unload(&self) -> Option<&'static str> {
        self.is_dirty().then_some(UNSYNCED_CHANGES_PROMPT)
    }
}

impl Default for UnsyncedChangeTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UnsyncedChangeTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnsyncedChangeTracker")
            .field("dirty", &self.is_dirty())
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}
