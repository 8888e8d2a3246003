use crate::keys::object_key;
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Local filesystem storage implementation
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage instance rooted at `base_path`, creating the
    /// directory if needed.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Convert a storage key to a filesystem path under the base directory.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        if storage_key.contains("..") || storage_key.starts_with('/') {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }

        let path = self.base_path.join(storage_key);
        if !path.starts_with(&self.base_path) {
            return Err(StorageError::InvalidKey(
                "Storage key resolves outside storage directory".to_string(),
            ));
        }

        Ok(path)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn fetch_bytes(
        &self,
        team_id: &str,
        upload_id: &str,
        file_name: &str,
    ) -> StorageResult<Bytes> {
        let key = object_key(team_id, upload_id, file_name)?;
        let path = self.key_to_path(&key)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(key));
        }

        let data = fs::read(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to read file {}: {}", path.display(), e))
        })?;

        tracing::debug!(
            key = %key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage fetch successful"
        );

        Ok(Bytes::from(data))
    }

    async fn put_bytes(
        &self,
        team_id: &str,
        upload_id: &str,
        file_name: &str,
        data: Bytes,
    ) -> StorageResult<String> {
        let key = object_key(team_id, upload_id, file_name)?;
        let path = self.key_to_path(&key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(&path, &data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        tracing::debug!(key = %key, size_bytes = data.len(), "Local storage put successful");

        Ok(key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let key = storage
            .put_bytes("team-1", "fp1", "resume.pdf", Bytes::from_static(b"%PDF-1.4"))
            .await
            .unwrap();
        assert_eq!(key, "team-1/fp1/resume.pdf");
        assert!(dir.path().join("team-1/fp1/resume.pdf").exists());

        let data = storage
            .fetch_bytes("team-1", "fp1", "resume.pdf")
            .await
            .unwrap();
        assert_eq!(&data[..], b"%PDF-1.4");
    }

    #[tokio::test]
    async fn test_fetch_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let err = storage
            .fetch_bytes("team-1", "fp1", "missing.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(ref key) if key == "team-1/fp1/missing.pdf"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let err = storage
            .fetch_bytes("team-1", "..", "passwd")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn test_new_creates_base_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        let storage = LocalStorage::new(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert_eq!(storage.base_path(), nested.as_path());
        assert_eq!(storage.backend_type(), StorageBackend::Local);
    }
}
