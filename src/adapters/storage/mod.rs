use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;

pub mod filesystem;

pub use filesystem::FsStorage;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage limit exceeded")]
    ExceedsLimit,
    #[error("Object not found")]
    NotFound,
    #[error("Internal storage error: {0}")]
    Internal(String),
}

pub type StorageResult<T> = Result<T, StorageError>;
/// A neutral byte stream that uses `std::io::Error` to avoid coupling to the application's error types.
pub type StorageStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

/// Result of a completed blob write.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub size: u64,
    /// SHA-256 of the content, hex-encoded. Doubles as the blob's ETag.
    pub content_hash: String,
}

#[async_trait]
pub trait BlobStorage: Send + Sync + 'static {
    /// Streams a blob into place. The write is atomic: a temp file is
    /// hashed and fsynced, then renamed onto the final key. A stream error
    /// or an over-limit payload leaves the final key untouched.
    async fn put(&self, key: &str, stream: StorageStream, max_size: usize) -> StorageResult<StoredBlob>;
    async fn get(&self, key: &str) -> StorageResult<(u64, StorageStream)>;
    async fn head(&self, key: &str) -> StorageResult<u64>;
    /// Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;
}
