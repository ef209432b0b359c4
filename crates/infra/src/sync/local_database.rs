//! In-memory document workspace
//!
//! Conversations, contexts and prompts are opaque JSON documents keyed by id.
//! The full workspace exports as one versioned snapshot. Importing a remote
//! snapshot adds the documents missing locally and leaves local copies
//! untouched, since any local edit is about to be uploaded anyway.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chatlab_core::LocalDatabase;
use chatlab_domain::{ChatLabError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    documents: BTreeMap<String, Value>,
}

#[derive(Default)]
struct Workspace {
    documents: BTreeMap<String, Value>,
    pending: u64,
}

/// [`LocalDatabase`] kept in process memory
#[derive(Default)]
pub struct InMemoryDatabase {
    workspace: RwLock<Workspace>,
}

impl InMemoryDatabase {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document, counting it as a pending change
    pub fn put(&self, id: impl Into<String>, document: Value) {
        let mut workspace = self.workspace.write();
        workspace.documents.insert(id.into(), document);
        workspace.pending += 1;
    }

    /// Delete a document; returns whether it existed
    pub fn delete(&self, id: &str) -> bool {
        let mut workspace = self.workspace.write();
        let existed = workspace.documents.remove(id).is_some();
        if existed {
            workspace.pending += 1;
        }
        existed
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Value> {
        self.workspace.read().documents.get(id).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.workspace.read().documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workspace.read().documents.is_empty()
    }
}

#[async_trait]
impl LocalDatabase for InMemoryDatabase {
    async fn export_snapshot(&self) -> Result<Vec<u8>> {
        let documents = self.workspace.read().documents.clone();
        let snapshot = Snapshot { version: SNAPSHOT_VERSION, documents };
        serde_json::to_vec(&snapshot)
            .map_err(|e| ChatLabError::Internal(format!("Failed to encode snapshot: {e}")))
    }

    async fn import_snapshot(&self, bytes: &[u8]) -> Result<()> {
        let snapshot: Snapshot = serde_json::from_slice(bytes)
            .map_err(|e| ChatLabError::InvalidInput(format!("Invalid workspace snapshot: {e}")))?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(ChatLabError::InvalidInput(format!(
                "Snapshot version {} is newer than supported version {SNAPSHOT_VERSION}",
                snapshot.version
            )));
        }

        let mut workspace = self.workspace.write();
        let mut added = 0usize;
        for (id, document) in snapshot.documents {
            workspace.documents.entry(id).or_insert_with(|| {
                added += 1;
                document
            });
        }
        debug!(added, total = workspace.documents.len(), "remote snapshot merged");
        Ok(())
    }

    async fn count_pending_changes(&self) -> Result<u64> {
        Ok(self.workspace.read().pending)
    }

    async fn mark_synced(&self) -> Result<()> {
        self.workspace.write().pending = 0;
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let workspace = self.workspace.read();
        f.debug_struct("InMemoryDatabase")
            .field("documents", &workspace.documents.len())
            .field("pending", &workspace.pending)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for sync::local_database.
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_changes_counted_until_synced() {
        let db = InMemoryDatabase::new();
        db.put("conv-1", json!({"title": "Hello"}));
        db.put("conv-1", json!({"title": "Hello again"}));
        assert!(!db.delete("missing"));

        assert_eq!(db.count_pending_changes().await.unwrap(), 2);
        db.mark_synced().await.unwrap();
        assert_eq!(db.count_pending_changes().await.unwrap(), 0);
        assert_eq!(db.len(), 1);
    }

    #[tokio::test]
    async fn test_import_keeps_local_copies() {
        let remote = InMemoryDatabase::new();
        remote.put("conv-1", json!({"title": "remote"}));
        remote.put("conv-2", json!({"title": "only remote"}));
        let snapshot = remote.export_snapshot().await.unwrap();

        let local = InMemoryDatabase::new();
        local.put("conv-1", json!({"title": "local"}));
        local.import_snapshot(&snapshot).await.unwrap();

        assert_eq!(local.get("conv-1"), Some(json!({"title": "local"})));
        assert_eq!(local.get("conv-2"), Some(json!({"title": "only remote"})));
        assert_eq!(local.count_pending_changes().await.unwrap(), 1, "imports are not pending");
    }

    #[tokio::test]
    async fn test_rejects_unknown_snapshots() {
        let db = InMemoryDatabase::new();

        let garbage = db.import_snapshot(b"not json").await;
        assert!(matches!(garbage, Err(ChatLabError::InvalidInput(_))));

        let future = br#"{"version":99,"documents":{}}"#;
        assert!(matches!(db.import_snapshot(future).await, Err(ChatLabError::InvalidInput(_))));
        assert!(db.is_empty());
    }
}
