//! Modular common utilities shared across Chat Lab crates.
//!
//! Nothing in here knows about tokens, Drive or the UI. The crate only
//! provides the scheduling and coordination primitives the core state
//! machines are built from.
//!
//! # Feature Tiers
//!
//! - `foundation`: error classification
//! - `runtime`: clocks, cancellable timers, single-flight, debounce windows
//!   and listener fan-out (enabled by default)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod events;
#[cfg(feature = "runtime")]
pub mod sync;
#[cfg(feature = "runtime")]
pub mod time;

#[cfg(feature = "foundation")]
pub use error::{ErrorClassification, ErrorSeverity};
#[cfg(feature = "runtime")]
pub use events::{EventBus, Listeners, Subscription};
#[cfg(feature = "runtime")]
pub use sync::{DebounceWindow, SingleFlight};
#[cfg(feature = "runtime")]
pub use time::{Clock, MockClock, SystemClock, TimerSlot};
