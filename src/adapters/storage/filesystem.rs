use crate::adapters::storage::{BlobStorage, StorageError, StorageResult, StorageStream, StoredBlob};
use async_trait::async_trait;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

const TMP_DIR: &str = ".tmp";

/// Content-addressed blob tree on the local filesystem. Writes stage into
/// `.tmp/` and move onto the final key with an atomic rename; readers never
/// observe a partial blob.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the blob and temp directories.
    ///
    /// # Errors
    /// Returns `StorageError::Internal` if the directories cannot be created.
    pub async fn init(&self) -> StorageResult<()> {
        tokio::fs::create_dir_all(self.root.join(TMP_DIR))
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        Ok(())
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn temp_path(&self) -> PathBuf {
        self.root.join(TMP_DIR).join(Uuid::new_v4().to_string())
    }

    /// Removes abandoned temp files older than `max_age`. Returns the count
    /// removed.
    ///
    /// # Errors
    /// Returns `StorageError::Internal` if the temp directory cannot be read.
    pub async fn sweep_temp(&self, max_age: Duration) -> StorageResult<u64> {
        let tmp = self.root.join(TMP_DIR);
        let mut entries =
            tokio::fs::read_dir(&tmp).await.map_err(|e| StorageError::Internal(e.to_string()))?;
        let cutoff = SystemTime::now() - max_age;
        let mut removed = 0;

        while let Ok(Some(entry)) = entries.next_entry().await.map_err(|e| StorageError::Internal(e.to_string())) {
            let stale = entry
                .metadata()
                .await
                .ok()
                .and_then(|m| m.modified().ok())
                .is_some_and(|modified| modified < cutoff);
            if stale && tokio::fs::remove_file(entry.path()).await.is_ok() {
                removed += 1;
            }
        }

        Ok(removed)
    }

    async fn write_stream(
        path: &Path,
        mut stream: StorageStream,
        max_size: usize,
    ) -> StorageResult<StoredBlob> {
        let mut file =
            tokio::fs::File::create(path).await.map_err(|e| StorageError::Internal(e.to_string()))?;
        let mut hasher = Sha256::new();
        let mut size: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| StorageError::Internal(e.to_string()))?;
            size += chunk.len() as u64;
            if size > max_size as u64 {
                return Err(StorageError::ExceedsLimit);
            }
            hasher.update(&chunk);
            file.write_all(&chunk).await.map_err(|e| StorageError::Internal(e.to_string()))?;
        }

        file.sync_all().await.map_err(|e| StorageError::Internal(e.to_string()))?;
        Ok(StoredBlob { size, content_hash: hex::encode(hasher.finalize()) })
    }
}

#[async_trait]
impl BlobStorage for FsStorage {
    #[tracing::instrument(level = "debug", skip(self, stream))]
    async fn put(&self, key: &str, stream: StorageStream, max_size: usize) -> StorageResult<StoredBlob> {
        let temp = self.temp_path();

        let blob = match Self::write_stream(&temp, stream, max_size).await {
            Ok(blob) => blob,
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp).await;
                return Err(e);
            }
        };

        let final_path = self.blob_path(key);
        if let Err(e) = tokio::fs::rename(&temp, &final_path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StorageError::Internal(e.to_string()));
        }

        tracing::debug!(key, size = blob.size, "Blob stored");
        Ok(blob)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn get(&self, key: &str) -> StorageResult<(u64, StorageStream)> {
        let path = self.blob_path(key);
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(StorageError::NotFound),
            Err(e) => return Err(StorageError::Internal(e.to_string())),
        };
        let size = file.metadata().await.map_err(|e| StorageError::Internal(e.to_string()))?.len();
        Ok((size, ReaderStream::new(file).boxed()))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn head(&self, key: &str) -> StorageResult<u64> {
        match tokio::fs::metadata(self.blob_path(key)).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
            Err(e) => Err(StorageError::Internal(e.to_string())),
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        match tokio::fs::remove_file(self.blob_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Internal(e.to_string())),
        }
    }
}
