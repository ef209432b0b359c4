//! Local change tracking and the delayed, retryable push to Drive
//!
//! ```text
//! write path ──► UnsyncedChangeTracker ──dirty──► SmartAutoSync ──delay──►
//!                      ▲                                 │
//!                      └──────────clean──────── DriveSyncService (SyncOperation)
//! ```

pub mod auto_sync;
pub mod error;
pub mod ports;
pub mod service;
pub mod settings;
pub mod tracker;

pub use error::SyncError;
