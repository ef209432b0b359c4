//! Persisted client state stores
//!
//! [`FileStateStore`] keeps every key in one JSON document; the in-memory
//! [`MemoryStateStore`] backs tests and ephemeral sessions.

pub mod file;
pub mod memory;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;
