//! JSON-file state store
//!
//! The whole store is one JSON object of string values, loaded lazily on
//! first access and rewritten on every change. Writes go to a sibling
//! temporary file which is then renamed over the original, so a crash never
//! leaves a half-written document behind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chatlab_core::StateStore;
use chatlab_domain::{ChatLabError, Result};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::errors::InfraError;

type Document = BTreeMap<String, String>;

/// [`StateStore`] persisted to a single JSON file
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    document: Mutex<Option<Document>>,
}

impl FileStateStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), document: Mutex::new(None) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<Document> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no state file yet");
                return Ok(Document::new());
            }
            Err(err) => return Err(InfraError::from(err).into()),
        };

        match serde_json::from_str(&raw) {
            Ok(document) => Ok(document),
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "state file is corrupt; starting from an empty store"
                );
                Ok(Document::new())
            }
        }
    }

    async fn write_document(&self, document: &Document) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(InfraError::from)?;
        }

        let raw = serde_json::to_vec_pretty(document)
            .map_err(|e| ChatLabError::Internal(format!("Failed to encode state file: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw).await.map_err(InfraError::from)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(InfraError::from)?;
        Ok(())
    }

    /// Apply `change` to the document and persist it
    ///
    /// The in-memory copy is only replaced once the write succeeded.
    async fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut Document) -> bool + Send,
    {
        let mut guard = self.document.lock().await;
        let mut document = match guard.as_ref() {
            Some(document) => document.clone(),
            None => self.read_document().await?,
        };

        if change(&mut document) {
            self.write_document(&document).await?;
        }
        *guard = Some(document);
        Ok(())
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut guard = self.document.lock().await;
        if guard.is_none() {
            *guard = Some(self.read_document().await?);
        }
        Ok(guard.as_ref().and_then(|document| document.get(key).cloned()))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.update(|document| {
            document.insert(key.to_string(), value);
            true
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.update(|document| document.remove(key).is_some()).await
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for storage::file.
    use tempfile::TempDir;

    use super::*;

    fn store_in(dir: &TempDir) -> FileStateStore {
        FileStateStore::new(dir.path().join("nested").join("state.json"))
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.set("sync_settings", r#"{"version":2}"#.to_string()).await.unwrap();
        store.set("last_full_sync_at", "2025-01-01T00:00:00Z".to_string()).await.unwrap();
        store.remove("last_full_sync_at").await.unwrap();

        let reopened = store_in(&dir);
        assert_eq!(
            reopened.get("sync_settings").await.unwrap().as_deref(),
            Some(r#"{"version":2}"#)
        );
        assert_eq!(reopened.get("last_full_sync_at").await.unwrap(), None);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert_eq!(store.get("anything").await.unwrap(), None);
        store.remove("anything").await.unwrap();
        assert!(!store.path().exists(), "removing a missing key writes nothing");
    }

    #[tokio::test]
    async fn test_corrupt_file_is_replaced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = FileStateStore::new(&path);

        assert_eq!(store.get("key").await.unwrap(), None);
        store.set("key", "value".to_string()).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let document: Document = serde_json::from_str(&raw).unwrap();
        assert_eq!(document.get("key").map(String::as_str), Some("value"));
    }
}
