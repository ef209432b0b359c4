//! # Chat Lab Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - HTTP adapters for the identity backend, the Chat Lab OAuth proxy and
//!   Google's OAuth endpoints (reqwest, shared cookie jar)
//! - JSON-file and in-memory state stores
//! - In-memory remote object store and local document database
//! - Configuration loading (env, `.env`, TOML/JSON) and tracing setup
//! - Runtime assembly of a [`chatlab_core::CoreContext`]
//!
//! ## Architecture
//! - Implements traits defined in `chatlab-core`
//! - Depends on `chatlab-common`, `chatlab-domain` and `chatlab-core`
//! - Contains all "impure" code (network, filesystem, environment)

pub mod config;
pub mod errors;
pub mod http;
pub mod observability;
pub mod runtime;
pub mod storage;
pub mod sync;

// Re-export commonly used items
pub use errors::InfraError;
pub use http::{GoogleOAuthProvider, HttpClient, HttpIdentityBackend, HttpOAuthBackend};
pub use observability::init_tracing;
pub use runtime::{build_context, build_ports, SyncBackends};
pub use storage::{FileStateStore, MemoryStateStore};
pub use sync::{InMemoryDatabase, InMemoryObjectStore};
