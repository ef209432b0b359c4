//! Authentication: two token lifecycles and the coordinator above them
//!
//! ```text
//! ┌──────────────────┐
//! │ AuthCoordinator  │  initialize / check_and_restore / events
//! └────────┬─────────┘
//!          │ identity first, then OAuth
//!          ├──► IdentityTokenLifecycle  (vault session, cookie-backed)
//!          │         ▲ AccessTokenProvider
//!          └──► OAuthTokenLifecycle ────┘  (Google credential, proxy + fallback)
//!                    │
//!                    └──► TokenCache  (memory + persisted copy)
//! ```
//!
//! Both lifecycles share the same scheduling shape: a proactive refresh
//! ten minutes before expiry, a one-minute retry after a failed proactive
//! refresh, and a five-minute validation tick.

pub mod coordinator;
pub mod error;
pub mod identity;
pub mod oauth;
pub mod ports;
pub mod schedule;
pub mod scopes;
pub mod token_cache;

pub use error::{AuthError, UserAction};
