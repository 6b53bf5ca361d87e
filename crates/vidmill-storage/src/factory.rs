//! Store construction from deployment configuration.

use crate::local::LocalStore;
use crate::memory::MemoryStore;
use crate::traits::{ContentStore, StorageError, StorageResult};
use std::path::PathBuf;
use std::sync::Arc;

/// Which storage backend to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Local filesystem rooted at the given directory.
    Local { base_path: PathBuf },
    /// In-process memory, for tests and ephemeral runs.
    Memory,
}

/// Create a content store for the selected backend.
pub async fn create_store(backend: StoreBackend) -> StorageResult<Arc<dyn ContentStore>> {
    match backend {
        StoreBackend::Local { base_path } => {
            if base_path.as_os_str().is_empty() {
                return Err(StorageError::ConfigError(
                    "local storage path must not be empty".to_string(),
                ));
            }
            let store = LocalStore::new(base_path).await?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}
