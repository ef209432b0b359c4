//! Port interface for persisted client state
//!
//! A flat string key/value store: the last known OAuth credential and user
//! profile, the pending anti-forgery state, the last full-sync timestamp and
//! the sync settings all live here. Values are JSON documents.

use async_trait::async_trait;
use chatlab_domain::{ChatLabError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

/// Trait for persisted client-side state
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read the raw value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Erase `key`; erasing a missing key is not an error
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Read and decode a JSON value
///
/// An undecodable payload is logged and treated as absent so a corrupted or
/// outdated entry never blocks start-up.
pub async fn load_json<T>(store: &dyn StateStore, key: &str) -> Result<Option<T>>
where
    T: DeserializeOwned,
{
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            warn!(key, error = %err, "discarding undecodable persisted state");
            Ok(None)
        }
    }
}

/// Encode a value as JSON and store it
pub async fn save_json<T>(store: &dyn StateStore, key: &str, value: &T) -> Result<()>
where
    T: Serialize + Sync,
{
    let raw = serde_json::to_string(value)
        .map_err(|e| ChatLabError::Internal(format!("Failed to encode {key}: {e}")))?;
    store.set(key, raw).await
}
