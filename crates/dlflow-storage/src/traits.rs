//! Storage abstraction trait
//!
//! This module defines the Storage trait the upload receiver writes through.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<StorageError> for dlflow_core::AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey(msg) => dlflow_core::AppError::InvalidInput(msg),
            other => dlflow_core::AppError::Storage(other.to_string()),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage abstraction trait
///
/// The validator and sampler read files by path, so every backend must be
/// able to resolve a key to a readable local path.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist `data` under `storage_key`, replacing any previous content.
    /// Readers never observe a partially written file. Returns the byte count.
    async fn put(&self, storage_key: &str, data: Bytes) -> StorageResult<u64>;

    /// Delete a stored file. Deleting a missing file is not an error.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Filesystem path the processing routines should open for this key.
    fn local_path(&self, storage_key: &str) -> StorageResult<PathBuf>;
}
