//! In-process map-backed store, used by tests and small deployments.

use crate::traits::{ContentStore, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory storage implementation. Same key semantics as the other
/// backends, nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Number of artifacts currently held.
    pub fn len(&self) -> usize {
        self.entries.read().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn validate_key(key: &str) -> StorageResult<()> {
        if key.is_empty() || key.contains("..") || key.starts_with('/') {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Self::validate_key(key)?;
        Ok(self
            .entries
            .read()
            .expect("store lock poisoned")
            .contains_key(key))
    }

    async fn write(&self, key: &str, data: Bytes) -> StorageResult<()> {
        Self::validate_key(key)?;
        self.entries
            .write()
            .expect("store lock poisoned")
            .insert(key.to_string(), data);
        Ok(())
    }

    async fn read(&self, key: &str) -> StorageResult<Bytes> {
        Self::validate_key(key)?;
        self.entries
            .read()
            .expect("store lock poisoned")
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        Self::validate_key(key)?;
        self.entries
            .write()
            .expect("store lock poisoned")
            .remove(key);
        Ok(())
    }

    async fn copy(&self, from_key: &str, to_key: &str) -> StorageResult<()> {
        Self::validate_key(from_key)?;
        Self::validate_key(to_key)?;

        let mut entries = self.entries.write().expect("store lock poisoned");
        let data = entries
            .get(from_key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(from_key.to_string()))?;
        entries.insert(to_key.to_string(), data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrip() {
        let store = MemoryStore::new();
        let data = Bytes::from_static(b"payload");

        store.write("a/b.mp4", data.clone()).await.unwrap();
        assert!(store.exists("a/b.mp4").await.unwrap());
        assert_eq!(store.read("a/b.mp4").await.unwrap(), data);

        store.delete("a/b.mp4").await.unwrap();
        assert!(!store.exists("a/b.mp4").await.unwrap());
    }

    #[tokio::test]
    async fn delete_missing_is_noop() {
        let store = MemoryStore::new();
        assert!(store.delete("missing").await.is_ok());
    }

    #[tokio::test]
    async fn copy_and_invalid_keys() {
        let store = MemoryStore::new();
        store
            .write("src.mp4", Bytes::from_static(b"x"))
            .await
            .unwrap();
        store.copy("src.mp4", "dst.mp4").await.unwrap();
        assert!(store.exists("dst.mp4").await.unwrap());

        assert!(matches!(
            store.read("../escape").await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            store.copy("missing", "dst2").await,
            Err(StorageError::NotFound(_))
        ));
    }
}
