//! Time-window debounce
//!
//! Unlike a trailing-edge debouncer this one never queues: a call inside the
//! window of the last completed call is simply skipped and the caller returns
//! its last known result.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Skips calls arriving within `window` of the previous completed call
#[derive(Debug)]
pub struct DebounceWindow {
    window: Duration,
    last_completed: Mutex<Option<Instant>>,
}

impl DebounceWindow {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self { window, last_completed: Mutex::new(None) }
    }

    /// Whether a call made now should be skipped
    #[must_use]
    pub fn should_skip(&self) -> bool {
        self.last_completed.lock().is_some_and(|at| at.elapsed() < self.window)
    }

    /// Record that a call just completed, opening a new window
    pub fn mark_completed(&self) {
        *self.last_completed.lock() = Some(Instant::now());
    }

    /// Forget the last completion so the next call goes through
    pub fn reset(&self) {
        *self.last_completed.lock() = None;
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for sync::debounce.
    use super::*;

    /// Validates `DebounceWindow::should_skip` behavior for the window expiry
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures nothing is skipped before the first completion.
    /// - Ensures calls inside the window are skipped.
    /// - Ensures calls after the window elapses go through.
    #[tokio::test(start_paused = true)]
    async fn test_window_expiry() {
        let debounce = DebounceWindow::new(Duration::from_secs(2));
        assert!(!debounce.should_skip());

        debounce.mark_completed();
        assert!(debounce.should_skip());

        tokio::time::advance(Duration::from_millis(1_999)).await;
        assert!(debounce.should_skip());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(!debounce.should_skip());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_reopens() {
        let debounce = DebounceWindow::new(Duration::from_secs(2));
        debounce.mark_completed();
        debounce.reset();
        assert!(!debounce.should_skip());
    }
}
