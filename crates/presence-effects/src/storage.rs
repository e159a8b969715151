//! Storage effect handler - production only
//!
//! One file per key under a base directory. Writes go to a uniquely named
//! temporary file in the same directory, are flushed to disk, and are then
//! renamed over the target so a crash mid-write never leaves a torn record.

use async_trait::async_trait;
use presence_core::effects::{StorageEffects, StorageError};
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Filesystem-based storage handler for production use
#[derive(Debug, Clone)]
pub struct FilesystemStorageHandler {
    base_path: PathBuf,
}

impl FilesystemStorageHandler {
    /// Create a new filesystem storage handler
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Base directory holding the records
    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }

    fn file_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey {
                reason: "Key cannot be empty".to_string(),
            });
        }
        if key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(StorageError::InvalidKey {
                reason: format!("Key '{key}' must be a plain file name"),
            });
        }
        Ok(self.base_path.join(format!("{key}.dat")))
    }
}

#[async_trait]
impl StorageEffects for FilesystemStorageHandler {
    async fn store(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        let file_path = self.file_path(key)?;
        fs::create_dir_all(&self.base_path).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to create directory: {e}"))
        })?;

        let tmp_path = self
            .base_path
            .join(format!(".{key}.{}.tmp", uuid::Uuid::new_v4().simple()));

        let write = async {
            let mut file = fs::File::create(&tmp_path).await?;
            file.write_all(&value).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&tmp_path, &file_path).await
        };

        if let Err(e) = write.await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::WriteFailed(format!(
                "Failed to write {}: {e}",
                file_path.display()
            )));
        }

        tracing::trace!(key, bytes = value.len(), "stored record");
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let file_path = self.file_path(key)?;
        match fs::read(&file_path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::ReadFailed(format!(
                "Failed to read {}: {e}",
                file_path.display()
            ))),
        }
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let file_path = self.file_path(key)?;
        match fs::remove_file(&file_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to remove {}: {e}",
                file_path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_retrieve_remove() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FilesystemStorageHandler::new(dir.path().join("nested"));

        assert_eq!(storage.retrieve("anchor").await.unwrap(), None);
        storage.store("anchor", b"v1".to_vec()).await.unwrap();
        storage.store("anchor", b"v2".to_vec()).await.unwrap();
        assert_eq!(storage.retrieve("anchor").await.unwrap(), Some(b"v2".to_vec()));
        assert!(storage.exists("anchor").await.unwrap());

        assert!(storage.remove("anchor").await.unwrap());
        assert!(!storage.remove("anchor").await.unwrap());
    }

    #[tokio::test]
    async fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FilesystemStorageHandler::new(dir.path().to_path_buf());
        storage.store("anchor", vec![1; 64]).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["anchor.dat".to_string()]);
    }

    #[tokio::test]
    async fn rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FilesystemStorageHandler::new(dir.path().to_path_buf());
        for key in ["", "../escape", "a/b", ".hidden"] {
            assert!(matches!(
                storage.store(key, vec![]).await,
                Err(StorageError::InvalidKey { .. })
            ));
        }
    }
}
