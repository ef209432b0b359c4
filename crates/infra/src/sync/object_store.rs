//! In-memory remote object store
//!
//! Stands in for the per-user, app-scoped Drive folder. Every call must carry
//! a non-empty access token, mirroring the real folder's authorisation.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chatlab_common::time::Clock;
use chatlab_core::RemoteObjectStore;
use chatlab_domain::{ChatLabError, RemoteObject, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

struct StoredObject {
    bytes: Vec<u8>,
    modified_at: DateTime<Utc>,
}

impl StoredObject {
    fn describe(&self, name: &str) -> RemoteObject {
        RemoteObject {
            name: name.to_string(),
            size_bytes: self.bytes.len() as u64,
            modified_at: self.modified_at,
        }
    }
}

/// [`RemoteObjectStore`] kept in process memory
pub struct InMemoryObjectStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryObjectStore {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { objects: RwLock::new(BTreeMap::new()), clock }
    }

    /// Number of stored objects
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

fn authorize(access_token: &str) -> Result<()> {
    if access_token.trim().is_empty() {
        return Err(ChatLabError::Auth("remote store requires an access token".to_string()));
    }
    Ok(())
}

#[async_trait]
impl RemoteObjectStore for InMemoryObjectStore {
    async fn list(&self, access_token: &str) -> Result<Vec<RemoteObject>> {
        authorize(access_token)?;
        Ok(self.objects.read().iter().map(|(name, object)| object.describe(name)).collect())
    }

    async fn upload(&self, access_token: &str, name: &str, bytes: Vec<u8>) -> Result<RemoteObject> {
        authorize(access_token)?;
        let object = StoredObject { bytes, modified_at: self.clock.now_utc() };
        let described = object.describe(name);
        self.objects.write().insert(name.to_string(), object);
        debug!(name, size_bytes = described.size_bytes, "object stored");
        Ok(described)
    }

    async fn download(&self, access_token: &str, name: &str) -> Result<Option<Vec<u8>>> {
        authorize(access_token)?;
        Ok(self.objects.read().get(name).map(|object| object.bytes.clone()))
    }

    async fn delete(&self, access_token: &str, name: &str) -> Result<bool> {
        authorize(access_token)?;
        Ok(self.objects.write().remove(name).is_some())
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore").field("objects", &self.len()).finish()
    }
}
