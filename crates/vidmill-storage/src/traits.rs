//! Storage abstraction trait
//!
//! This module defines the ContentStore trait that all storage backends
//! must implement.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage abstraction trait
///
/// Backends (local disk, in-process memory, a cloud blob store) implement
/// this so the pipeline can persist artifacts without coupling to any of
/// them. Keys are relative paths; writes have idempotent overwrite
/// semantics so a partially failed pipeline run can be retried from the
/// top.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Check whether an artifact exists at the key.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Write the bytes at the key, overwriting any previous artifact.
    async fn write(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Read the artifact at the key.
    async fn read(&self, key: &str) -> StorageResult<Bytes>;

    /// Delete the artifact at the key. Deleting a missing key is a no-op.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Copy an artifact from one key to another.
    async fn copy(&self, from_key: &str, to_key: &str) -> StorageResult<()>;
}
