//! Smart auto-sync: delayed, retryable push of dirty local state
//!
//! While enabled, a clean→dirty transition of the tracker arms a one-shot
//! timer for `delay_minutes`. When it fires and the tracker is still dirty,
//! the injected [`SyncOperation`] runs:
//!
//! - success: retry count reset and the tracker marked clean through the
//!   revision read before the run. A change recorded while the sync ran
//!   keeps the flag set and schedules a normal delayed sync instead. A
//!   backstop re-check one second after a clean result does the same if
//!   the flag is set with nothing scheduled.
//! - failure: retry count incremented and another attempt armed after
//!   `retry_delay_minutes`, until `max_retries` attempts have failed; then
//!   the state resets and nothing is scheduled until the next dirty
//!   transition
//!
//! Errors never leave the scheduler except through
//! [`SmartAutoSync::force_sync`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chatlab_common::events::Subscription;
use chatlab_common::time::{Clock, TimerSlot};
use chatlab_domain::constants::AUTO_SYNC_REVERIFY_MS;
use chatlab_domain::{AutoSyncConfig, SyncAttemptState, SyncReport, SyncStatus};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use super::error::SyncError;
use super::ports::SyncOperation;
use super::tracker::UnsyncedChangeTracker;

/// Delayed, retryable auto-sync scheduler
///
/// Cheap to clone; clones share state. Scheduling spawns tokio tasks, so
/// `enable`, `update_config` and dirty transitions must happen inside a
/// tokio runtime.
#[derive(Clone)]
pub struct SmartAutoSync {
    inner: Arc<Inner>,
}

struct Inner {
    tracker: Arc<UnsyncedChangeTracker>,
    operation: Arc<dyn SyncOperation>,
    clock: Arc<dyn Clock>,
    config: RwLock<AutoSyncConfig>,
    enabled: AtomicBool,
    in_progress: AtomicBool,
    attempt: Mutex<SyncAttemptState>,
    timer: TimerSlot,
    reverify: TimerSlot,
    subscription: Mutex<Option<Subscription>>,
}

impl SmartAutoSync {
    #[must_use]
    pub fn new(
        tracker: Arc<UnsyncedChangeTracker>,
        operation: Arc<dyn SyncOperation>,
        clock: Arc<dyn Clock>,
        config: AutoSyncConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                tracker,
                operation,
                clock,
                config: RwLock::new(config),
                enabled: AtomicBool::new(false),
                in_progress: AtomicBool::new(false),
                attempt: Mutex::new(SyncAttemptState::default()),
                timer: TimerSlot::new("auto-sync"),
                reverify: TimerSlot::new("auto-sync-reverify"),
                subscription: Mutex::new(None),
            }),
        }
    }

    /// Start following the tracker
    ///
    /// Resets the retry count and schedules a sync right away if the tracker
    /// is already dirty. Enabling twice is a no-op.
    pub fn enable(&self) {
        if self.inner.enabled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.attempt.lock().reset();

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let subscription = self.inner.tracker.add_listener(move |dirty| {
            if let Some(inner) = weak.upgrade() {
                inner.on_transition(*dirty);
            }
        });
        *self.inner.subscription.lock() = Some(subscription);

        let delay = self.inner.config.read().delay();
        info!(delay_secs = delay.as_secs(), "auto-sync enabled");
        if self.inner.tracker.is_dirty() {
            self.inner.schedule(delay);
        }
    }

    /// Stop following the tracker and cancel anything scheduled
    pub fn disable(&self) {
        if !self.inner.enabled.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(subscription) = self.inner.subscription.lock().take() {
            subscription.unsubscribe();
        }
        self.inner.timer.cancel();
        self.inner.reverify.cancel();
        self.inner.attempt.lock().next_scheduled_at = None;
        info!("auto-sync disabled");
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// Current read model; the countdown is derived on every call
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        let attempt = self.inner.attempt.lock().clone();
        let countdown_seconds = attempt.next_scheduled_at.map_or(0, |at| {
            let remaining_ms = (at - self.inner.clock.now_utc()).num_milliseconds();
            u64::try_from(remaining_ms / 1000).unwrap_or(0)
        });

        SyncStatus {
            enabled: self.is_enabled(),
            is_dirty: self.inner.tracker.is_dirty(),
            in_progress: self.inner.in_progress.load(Ordering::SeqCst),
            last_attempt_at: attempt.last_attempt_at,
            retry_count: attempt.retry_count,
            next_scheduled_at: attempt.next_scheduled_at,
            countdown_seconds,
        }
    }

    /// Change delay and retry parameters
    ///
    /// A scheduled sync is re-armed under the new parameters: the retry
    /// delay while retrying, the normal delay otherwise.
    pub fn update_config(&self, config: AutoSyncConfig) {
        *self.inner.config.write() = config;
        debug!(?config, "auto-sync config updated");

        if self.inner.timer.is_armed() {
            let retrying = self.inner.attempt.lock().retry_count > 0;
            let delay = if retrying { config.retry_delay() } else { config.delay() };
            self.inner.schedule(delay);
        }
    }

    #[must_use]
    pub fn config(&self) -> AutoSyncConfig {
        *self.inner.config.read()
    }

    /// Run the sync now, outside the delay and retry machinery
    ///
    /// Cancels any scheduled attempt. Errors are returned to the caller and
    /// do not count as retries.
    #[instrument(skip(self), name = "auto_sync.force_sync")]
    pub async fn force_sync(&self) -> Result<SyncReport, SyncError> {
        self.inner.timer.cancel();
        self.inner.attempt.lock().next_scheduled_at = None;

        let revision = self.inner.tracker.revision();
        let report = self.inner.run_operation().await?;
        self.inner.attempt.lock().reset();
        info!(uploaded_bytes = report.uploaded_bytes, "manual sync completed");
        self.inner.settle_success(revision);
        Ok(report)
    }
}

impl Inner {
    fn on_transition(self: &Arc<Self>, dirty: bool) {
        if !self.enabled.load(Ordering::SeqCst) {
            return;
        }
        if dirty {
            let delay = self.config.read().delay();
            self.schedule(delay);
        } else if self.timer.cancel() {
            debug!("changes synced elsewhere; pending auto-sync cancelled");
            self.attempt.lock().reset();
        }
    }

    fn schedule(self: &Arc<Self>, delay: Duration) {
        let at = self.clock.now_utc()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        self.attempt.lock().next_scheduled_at = Some(at);

        let weak = Arc::downgrade(self);
        self.timer.schedule(delay, move || async move {
            if let Some(inner) = weak.upgrade() {
                inner.fire().await;
            }
        });
        debug!(delay_secs = delay.as_secs(), "auto-sync scheduled");
    }

    async fn fire(self: &Arc<Self>) {
        self.attempt.lock().next_scheduled_at = None;
        if !self.enabled.load(Ordering::SeqCst) {
            return;
        }
        if !self.tracker.is_dirty() {
            debug!("nothing to sync; scheduled auto-sync skipped");
            self.attempt.lock().reset();
            return;
        }

        let revision = self.tracker.revision();
        match self.run_operation().await {
            Ok(report) => {
                self.attempt.lock().reset();
                info!(
                    pending = report.pending_before,
                    uploaded_bytes = report.uploaded_bytes,
                    "auto-sync completed"
                );
                self.settle_success(revision);
            }
            Err(err) => self.record_failure(&err),
        }
    }

    /// Clear the flag through `revision`, or schedule another run for
    /// changes recorded while the sync was running
    fn settle_success(self: &Arc<Self>, revision: u64) {
        if self.tracker.mark_synced_through(revision) {
            if self.enabled.load(Ordering::SeqCst) {
                self.arm_reverify();
            }
        } else if self.enabled.load(Ordering::SeqCst) {
            debug!("changes recorded during sync; scheduling another");
            let delay = self.config.read().delay();
            self.schedule(delay);
        }
    }

    async fn run_operation(&self) -> Result<SyncReport, SyncError> {
        self.attempt.lock().last_attempt_at = Some(self.clock.now_utc());
        self.in_progress.store(true, Ordering::SeqCst);
        let result = self.operation.sync().await;
        self.in_progress.store(false, Ordering::SeqCst);
        result
    }

    fn record_failure(self: &Arc<Self>, err: &SyncError) {
        let config = *self.config.read();
        let retry_count = {
            let mut attempt = self.attempt.lock();
            attempt.retry_count += 1;
            attempt.retry_count
        };

        if retry_count < config.max_retries {
            warn!(
                retry_count,
                max_retries = config.max_retries,
                error = %err,
                "auto-sync failed; retrying later"
            );
            self.schedule(config.retry_delay());
        } else {
            warn!(retry_count, error = %err, "auto-sync failed; giving up until new changes");
            self.attempt.lock().reset();
        }
    }

    fn arm_reverify(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.reverify.schedule(Duration::from_millis(AUTO_SYNC_REVERIFY_MS), move || async move {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if inner.enabled.load(Ordering::SeqCst)
                && inner.tracker.is_dirty()
                && !inner.timer.is_armed()
            {
                debug!("changes reappeared after sync; scheduling another");
                let delay = inner.config.read().delay();
                inner.schedule(delay);
            }
        });
    }
}

impl std::fmt::Debug for SmartAutoSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmartAutoSync").field("status", &self.status()).finish_non_exhaustive()
    }
}
