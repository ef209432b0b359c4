//! Clock abstraction for deterministic time in tests
//!
//! Token expiry is expressed in epoch milliseconds while timers run on the
//! tokio clock. [`MockClock`] derives its epoch time from the tokio clock so
//! that `tokio::time::pause()` + `advance()` moves both together.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tokio::time::Instant;

/// Abstraction over the wall clock
pub trait Clock: Send + Sync + 'static {
    /// Milliseconds since the UNIX epoch
    fn now_ms(&self) -> i64;

    /// Current wall-clock time as a UTC timestamp
    fn now_utc(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.now_ms()).single().unwrap_or_else(Utc::now)
    }
}

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Implement Clock for `Arc<T>` where T: Clock for convenient sharing
impl<T: Clock> Clock for Arc<T> {
    fn now_ms(&self) -> i64 {
        (**self).now_ms()
    }
}

/// Mock clock for deterministic testing
///
/// Anchored to a fixed epoch time at creation; elapsed tokio time (real or
/// paused/advanced) is added on top, plus any manual [`MockClock::advance`].
#[derive(Debug, Clone)]
pub struct MockClock {
    origin_ms: i64,
    origin: Instant,
    offset_ms: Arc<AtomicI64>,
}

impl MockClock {
    /// Create a mock clock anchored at the given epoch milliseconds
    #[must_use]
    pub fn at_epoch_ms(origin_ms: i64) -> Self {
        Self { origin_ms, origin: Instant::now(), offset_ms: Arc::new(AtomicI64::new(0)) }
    }

    /// Create a mock clock anchored at the current system time
    #[must_use]
    pub fn new() -> Self {
        Self::at_epoch_ms(Utc::now().timestamp_millis())
    }

    /// Advance the wall clock without moving tokio timers
    pub fn advance(&self, duration: std::time::Duration) {
        let millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        self.offset_ms.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> i64 {
        let elapsed = i64::try_from(self.origin.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.origin_ms
            .saturating_add(elapsed)
            .saturating_add(self.offset_ms.load(Ordering::SeqCst))
    }
}
