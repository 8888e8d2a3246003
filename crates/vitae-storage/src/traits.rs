//! Storage abstraction trait
//!
//! This module defines the Storage trait that all object store backends implement.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use vitae_core::{PipelineError, StorageBackend};

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for PipelineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => {
                PipelineError::ObjectStore(format!("object not found: {}", key))
            }
            other => PipelineError::ObjectStore(other.to_string()),
        }
    }
}

/// Object store collaborator.
///
/// Objects are addressed by the owning team, the upload id and the original file
/// name; see [`crate::keys::object_key`] for the resulting key.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Fetch the full contents of an uploaded object.
    async fn fetch_bytes(
        &self,
        team_id: &str,
        upload_id: &str,
        file_name: &str,
    ) -> StorageResult<Bytes>;

    /// Store an object and return its key.
    async fn put_bytes(
        &self,
        team_id: &str,
        upload_id: &str,
        file_name: &str,
        data: Bytes,
    ) -> StorageResult<String>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
