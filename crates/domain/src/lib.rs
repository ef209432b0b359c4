//! # Chat Lab Domain
//!
//! Plain data model for the Chat Lab auth-and-sync core.
//!
//! This crate contains:
//! - Credentials, user profiles and the derived auth status
//! - Auto-sync attempt state, status read model and versioned settings
//! - Configuration structures
//! - Domain error types and Result definitions
//! - Timing constants and persisted-state keys
//!
//! ## Architecture
//! - No dependencies on other Chat Lab crates
//! - Only external dependencies allowed
//! - Pure data structures; no I/O and no clock access

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
