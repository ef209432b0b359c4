//! One-shot and recurring timers with a single disposal path
//!
//! A [`TimerSlot`] owns at most one armed timer. Scheduling into an armed
//! slot cancels the previous timer first, so a slot can never fire twice for
//! one scheduling site. Cancelling is idempotent and dropping the slot
//! cancels whatever is armed.
//!
//! A one-shot timer disarms its slot *before* running its callback, so the
//! callback may freely reschedule (or cancel) the same slot without
//! cancelling itself.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// A timer handle that can be used to cancel a timer
#[derive(Debug, Clone)]
pub struct TimerHandle {
    token: CancellationToken,
}

impl TimerHandle {
    fn new() -> Self {
        Self { token: CancellationToken::new() }
    }

    /// Cancel the timer
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check if the timer has been cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug)]
struct Armed {
    id: u64,
    handle: TimerHandle,
    deadline: Instant,
}

/// Owned slot for one cancellable timer
#[derive(Debug)]
pub struct TimerSlot {
    name: &'static str,
    armed: Arc<Mutex<Option<Armed>>>,
    next_id: AtomicU64,
}

impl TimerSlot {
    /// Create an empty slot; `name` only shows up in traces
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self { name, armed: Arc::new(Mutex::new(None)), next_id: AtomicU64::new(1) }
    }

    /// Arm a one-shot timer that runs `task` after `delay`
    ///
    /// Any previously armed timer in this slot is cancelled first. Must be
    /// called from within a tokio runtime.
    pub fn schedule<F, Fut>(&self, delay: Duration, task: F) -> TimerHandle
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (id, handle, deadline) = self.arm(delay);
        let armed = Arc::clone(&self.armed);
        let name = self.name;
        let token = handle.token.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    trace!(timer = name, "timer cancelled before firing");
                    return;
                }
                () = sleep_until(deadline) => {}
            }

            {
                let mut slot = armed.lock();
                match slot.as_ref() {
                    Some(current) if current.id == id => *slot = None,
                    _ => return,
                }
            }

            trace!(timer = name, "timer fired");
            task().await;
        });

        handle
    }

    /// Arm a recurring timer that runs `task` every `period`
    ///
    /// The first run happens one `period` after scheduling. The slot stays
    /// armed until cancelled; [`TimerSlot::deadline`] reports the first tick.
    pub fn schedule_every<F, Fut>(&self, period: Duration, mut task: F) -> TimerHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (_, handle, _) = self.arm(period);
        let token = handle.token.clone();
        let name = self.name;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // Skip first immediate tick

            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = interval.tick() => {}
                }
                trace!(timer = name, "recurring timer tick");
                task().await;
            }
        });

        handle
    }

    /// Cancel the armed timer, returning whether one was armed
    pub fn cancel(&self) -> bool {
        match self.armed.lock().take() {
            Some(previous) => {
                previous.handle.cancel();
                trace!(timer = self.name, "timer slot cancelled");
                true
            }
            None => false,
        }
    }

    /// Whether a timer is currently armed and has not fired yet
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed.lock().is_some()
    }

    /// Deadline of the armed timer
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.armed.lock().as_ref().map(|armed| armed.deadline)
    }

    /// Time left until the armed timer fires
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline().map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    fn arm(&self, delay: Duration) -> (u64, TimerHandle, Instant) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = TimerHandle::new();
        let deadline = Instant::now() + delay;

        let previous =
            self.armed.lock().replace(Armed { id, handle: handle.clone(), deadline });
        if let Some(previous) = previous {
            previous.handle.cancel();
            trace!(timer = self.name, "replaced armed timer");
        }

        (id, handle, deadline)
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        if let Some(armed) = self.armed.lock().take() {
            armed.handle.cancel();
        }
    }
}
