//! Time utilities and abstractions
//!
//! - **[`clock`]**: wall-clock abstraction with a real and a mock
//!   implementation
//! - **[`timer`]**: [`TimerSlot`], the single owned, cancellable handle every
//!   scheduling site goes through
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//!
//! use chatlab_common::time::{Clock, MockClock, TimerSlot};
//!
//! #[tokio::main]
//! async fn main() {
//!     let clock = MockClock::at_epoch_ms(1_700_000_000_000);
//!     assert_eq!(clock.now_ms(), 1_700_000_000_000);
//!
//!     let slot = TimerSlot::new("example");
//!     slot.schedule(Duration::from_secs(60), || async {});
//!     assert!(slot.is_armed());
//!     slot.cancel();
//!     assert!(!slot.is_armed());
//! }
//! ```

pub mod clock;
pub mod timer;

pub use clock::{Clock, MockClock, SystemClock};
pub use timer::TimerSlot;
