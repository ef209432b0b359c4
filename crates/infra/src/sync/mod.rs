//! Sync backends for the Drive sync operation
//!
//! - [`InMemoryObjectStore`]: app-scoped blob folder kept in memory
//! - [`InMemoryDatabase`]: document workspace exported as one JSON snapshot

pub mod local_database;
pub mod object_store;

pub use local_database::InMemoryDatabase;
pub use object_store::InMemoryObjectStore;
