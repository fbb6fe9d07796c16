//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageDriver;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Unknown storage location: {0}")]
    UnknownLocation(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Chunked byte stream returned by downloads.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Acknowledgment of a completed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutAck {
    /// Full key the object was written under (root prefix included).
    pub key: String,
    pub bytes_written: u64,
}

/// Result of a delete request. `deleted` is false when the object was already absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub deleted: bool,
}

/// Storage abstraction trait
///
/// All storage backends (S3, local filesystem) implement this trait so the
/// ingestion pipeline and the file lifecycle service work with any of them.
/// Keys are disk filenames; backends resolve them under their own root.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write the reader's content to `key` until EOF, replacing any existing object.
    ///
    /// The content is streamed; backends must not require it to fit in memory.
    async fn put(
        &self,
        key: &str,
        reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<PutAck>;

    /// Write an in-memory buffer to `key`.
    async fn put_bytes(&self, key: &str, data: Vec<u8>) -> StorageResult<PutAck> {
        let reader = Box::pin(std::io::Cursor::new(data)) as Pin<Box<dyn AsyncRead + Send + Unpin>>;
        self.put(key, reader).await
    }

    /// Delete the object at `key`. Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> StorageResult<DeleteOutcome>;

    /// Check if an object exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get the size in bytes of an object, if it exists.
    async fn content_length(&self, key: &str) -> StorageResult<u64>;

    /// Download an object as a stream of chunks (for large files)
    async fn download_stream(&self, key: &str) -> StorageResult<ByteStream>;

    /// Download a whole object into memory.
    async fn download(&self, key: &str) -> StorageResult<Vec<u8>> {
        let mut stream = self.download_stream(key).await?;
        let mut data = Vec::new();
        while let Some(chunk) = stream.next().await {
            data.extend_from_slice(&chunk?);
        }
        Ok(data)
    }

    /// Get the storage driver type
    fn driver(&self) -> StorageDriver;
}

impl From<StorageError> for vellum_core::AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => {
                vellum_core::AppError::NotFound(format!("Stored file not found: {}", key))
            }
            StorageError::InvalidKey(_) | StorageError::UnknownLocation(_) => {
                vellum_core::AppError::InvalidInput(err.to_string())
            }
            StorageError::ConfigError(_) => vellum_core::AppError::Configuration(err.to_string()),
            other => vellum_core::AppError::Storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_core::{AppError, ErrorMetadata};

    #[test]
    fn test_not_found_maps_to_not_found() {
        let err: AppError = StorageError::NotFound("a.jpg".to_string()).into();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(err.http_status_code(), 404);
    }

    #[test]
    fn test_backend_failures_map_to_storage() {
        let err: AppError = StorageError::DeleteFailed("permission denied".to_string()).into();
        assert!(matches!(err, AppError::Storage(ref msg) if msg.contains("permission denied")));
    }

    #[test]
    fn test_unknown_location_is_invalid_input() {
        let err: AppError = StorageError::UnknownLocation("tape".to_string()).into();
        assert!(matches!(err, AppError::InvalidInput(ref msg) if msg.contains("tape")));
    }
}
