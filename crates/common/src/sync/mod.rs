//! Coordination primitives for logically concurrent operations
//!
//! - **[`single_flight`]**: coalesce concurrent identical operations into one
//!   in-flight future whose result every caller shares
//! - **[`debounce`]**: skip calls that arrive within a window of the previous
//!   *completed* call
//!
//! Single-flight suppresses *concurrent* invocations; debounce suppresses
//! *repeated* ones. Token refresh uses the former, the auth coordinator's
//! public entry points use both.

pub mod debounce;
pub mod single_flight;

pub use debounce::DebounceWindow;
pub use single_flight::SingleFlight;
