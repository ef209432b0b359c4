//! Proactive refresh planning
//!
//! Both lifecycles refresh ten minutes ahead of expiry. A credential that is
//! already inside the window is refreshed inline; otherwise a one-shot timer
//! is armed for `time_until_expiry - window`.

use std::time::Duration;

/// When the next proactive refresh should happen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPlan {
    Now,
    After(Duration),
}

/// Plan the proactive refresh for a credential expiring in
/// `time_until_expiry_ms`
#[must_use]
pub fn plan(time_until_expiry_ms: i64, window: Duration) -> RefreshPlan {
    let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
    let lead_ms = time_until_expiry_ms.saturating_sub(window_ms);
    if lead_ms <= 0 {
        RefreshPlan::Now
    } else {
        RefreshPlan::After(Duration::from_millis(lead_ms.unsigned_abs()))
    }
}
