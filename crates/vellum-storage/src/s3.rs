use crate::keys::{prefixed_key, validate_key};
use crate::traits::{ByteStream, DeleteOutcome, PutAck, Storage, StorageError, StorageResult};
use crate::StorageDriver;
use async_trait::async_trait;
use futures::StreamExt;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStoreExt, Result as ObjectResult, WriteMultipart};
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Read size used when feeding a multipart upload.
const READ_CHUNK_SIZE: usize = 64 * 1024;
/// Parts in flight before the reader waits for the backend.
const MAX_CONCURRENT_PARTS: usize = 4;

/// S3 storage implementation
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
    prefix: Option<String>,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    /// * `prefix` - Optional key prefix all objects of this location live under
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
        prefix: Option<String>,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage {
            store,
            bucket,
            prefix,
        })
    }

    fn location(&self, key: &str) -> StorageResult<(String, Path)> {
        validate_key(key)?;
        let full_key = prefixed_key(self.prefix.as_deref(), key);
        let location = Path::from(full_key.clone());
        Ok((full_key, location))
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn put(
        &self,
        key: &str,
        mut reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<PutAck> {
        let (full_key, location) = self.location(key)?;
        let start = std::time::Instant::now();

        let upload = self
            .store
            .put_multipart(&location)
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        let writer = WriteMultipart::new(upload);

        let bytes_written = stream_to_multipart(writer, &mut reader, &full_key)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %full_key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 stream upload failed"
                );
                e
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %full_key,
            size_bytes = bytes_written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 stream upload successful"
        );

        Ok(PutAck {
            key: full_key,
            bytes_written,
        })
    }

    async fn delete(&self, key: &str) -> StorageResult<DeleteOutcome> {
        let (full_key, location) = self.location(key)?;
        let start = std::time::Instant::now();

        // S3 deletes are idempotent; head tells whether there was anything to delete.
        match self.store.head(&location).await {
            Ok(_) => {}
            Err(ObjectStoreError::NotFound { .. }) => {
                tracing::debug!(key = %full_key, "S3 delete: object already absent");
                return Ok(DeleteOutcome { deleted: false });
            }
            Err(e) => return Err(StorageError::DeleteFailed(e.to_string())),
        }

        let result: ObjectResult<_> = self.store.delete(&location).await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %full_key,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 delete failed"
            );
            StorageError::DeleteFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %full_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(DeleteOutcome { deleted: true })
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let (_, location) = self.location(key)?;
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn content_length(&self, key: &str) -> StorageResult<u64> {
        let (full_key, location) = self.location(key)?;
        match self.store.head(&location).await {
            Ok(meta) => Ok(meta.size as u64),
            Err(ObjectStoreError::NotFound { .. }) => Err(StorageError::NotFound(full_key)),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn download_stream(&self, key: &str) -> StorageResult<ByteStream> {
        let (full_key, location) = self.location(key)?;
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self.store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(full_key.clone()),
            other => StorageError::DownloadFailed(other.to_string()),
        })?;

        let bucket = self.bucket.clone();

        let stream = result.into_stream().map(move |res| match res {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                tracing::error!(
                    bucket = %bucket,
                    key = %full_key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 stream download error"
                );
                Err(StorageError::DownloadFailed(e.to_string()))
            }
        });

        Ok(Box::pin(stream))
    }

    fn driver(&self) -> StorageDriver {
        StorageDriver::S3
    }
}

/// Feed `reader` into `writer` and complete the upload.
///
/// A failure while reading or while waiting on in-flight parts aborts the
/// multipart upload before the error is returned.
async fn stream_to_multipart(
    mut writer: WriteMultipart,
    reader: &mut Pin<Box<dyn AsyncRead + Send + Unpin>>,
    key: &str,
) -> StorageResult<u64> {
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    let mut bytes_written: u64 = 0;

    loop {
        let read = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                abort_upload(writer, key).await;
                return Err(StorageError::UploadFailed(format!(
                    "Failed to read from stream after {} bytes: {}",
                    bytes_written, e
                )));
            }
        };

        if let Err(e) = writer.wait_for_capacity(MAX_CONCURRENT_PARTS).await {
            abort_upload(writer, key).await;
            return Err(StorageError::UploadFailed(format!(
                "Part upload failed after {} bytes: {}",
                bytes_written, e
            )));
        }
        writer.write(&buf[..read]);
        bytes_written += read as u64;
    }

    let result: ObjectResult<_> = writer.finish().await;
    result.map_err(|e| StorageError::UploadFailed(e.to_string()))?;
    Ok(bytes_written)
}

async fn abort_upload(writer: WriteMultipart, key: &str) {
    if let Err(e) = writer.abort().await {
        tracing::warn!(error = %e, key = %key, "Failed to abort S3 multipart upload");
    }
}
