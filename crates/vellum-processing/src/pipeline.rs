//! Streaming ingestion: store the upload and extract image metadata in one pass.
//!
//! For image uploads the source stream is teed. The storage branch writes every byte
//! to the selected backend while the inspection branch feeds a [`HeaderScanner`]
//! until it has seen the image headers. Both branches are awaited before
//! [`IngestionPipeline::ingest`] returns, so a caller never observes a stored file
//! whose metadata is still pending. Non-image uploads bypass the tee entirely.

use tokio::sync::mpsc;
use tokio_util::io::StreamReader;
use vellum_core::Config;
use vellum_storage::{PutAck, Storage, StorageRegistry, StorageResult};

use crate::extractor::{is_image_mime, MetadataExtractor};
use crate::header::{HeaderInfo, HeaderScanner, ScanState};
use crate::metadata::ImageMetadata;
use crate::tee::{tee, Tee, UploadStream};

const DEFAULT_CHANNEL_CAPACITY: usize = 16;
const DEFAULT_MAX_HEADER_BYTES: usize = 4 * 1024 * 1024;

/// What an ingest produced.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    /// Storage acknowledgment; `bytes_written` is the authoritative file size.
    pub ack: PutAck,
    /// Present only for image uploads whose headers could be decoded.
    pub metadata: Option<ImageMetadata>,
}

impl IngestOutcome {
    pub fn bytes_written(&self) -> u64 {
        self.ack.bytes_written
    }
}

#[derive(Clone)]
pub struct IngestionPipeline {
    registry: StorageRegistry,
    extractor: MetadataExtractor,
    channel_capacity: usize,
    max_header_bytes: usize,
}

impl IngestionPipeline {
    pub fn new(registry: StorageRegistry) -> Self {
        Self {
            registry,
            extractor: MetadataExtractor::new(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
        }
    }

    pub fn from_config(registry: StorageRegistry, config: &Config) -> Self {
        Self::new(registry)
            .with_channel_capacity(config.ingest_channel_capacity)
            .with_max_header_bytes(config.ingest_max_header_bytes)
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn with_max_header_bytes(mut self, max: usize) -> Self {
        self.max_header_bytes = max;
        self
    }

    pub fn registry(&self) -> &StorageRegistry {
        &self.registry
    }

    /// Store `source` under `filename_disk` in the `storage` location and, for image
    /// mime types, extract metadata from the same bytes.
    ///
    /// A storage failure fails the ingest. An extraction failure only means
    /// `metadata` is `None`.
    pub async fn ingest(
        &self,
        source: UploadStream,
        storage: &str,
        filename_disk: &str,
        mime_type: Option<&str>,
    ) -> StorageResult<IngestOutcome> {
        let backend = self.registry.location(storage)?;
        let start = std::time::Instant::now();

        if !is_image_mime(mime_type) {
            let ack = put_stream(backend.as_ref(), filename_disk, source).await?;
            tracing::info!(
                storage = %storage,
                key = %ack.key,
                size_bytes = ack.bytes_written,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Ingested file without metadata extraction"
            );
            return Ok(IngestOutcome { ack, metadata: None });
        }

        let Tee {
            storage: reader,
            inspect,
            driver,
        } = tee(source, self.channel_capacity);

        let (summary, stored, header) = tokio::join!(
            driver,
            backend.put(filename_disk, reader),
            scan_headers(inspect, self.max_header_bytes),
        );
        let ack = stored?;

        if summary.bytes_read != ack.bytes_written {
            tracing::warn!(
                bytes_read = summary.bytes_read,
                bytes_written = ack.bytes_written,
                key = %ack.key,
                "Storage acknowledged a different size than was read"
            );
        }

        let metadata = self.extract(mime_type, header, ack.bytes_written).await;

        tracing::info!(
            storage = %storage,
            key = %ack.key,
            size_bytes = ack.bytes_written,
            bytes_inspected = summary.bytes_inspected,
            has_metadata = metadata.is_some(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Ingested image"
        );

        Ok(IngestOutcome { ack, metadata })
    }

    /// Overwrite `filename_disk` in `storage` with `source` without inspecting it.
    pub async fn replace(
        &self,
        source: UploadStream,
        storage: &str,
        filename_disk: &str,
    ) -> StorageResult<PutAck> {
        let backend = self.registry.location(storage)?;
        let ack = put_stream(backend.as_ref(), filename_disk, source).await?;
        tracing::info!(
            storage = %storage,
            key = %ack.key,
            size_bytes = ack.bytes_written,
            "Replaced stored file content"
        );
        Ok(ack)
    }

    async fn extract(
        &self,
        mime_type: Option<&str>,
        mut header: HeaderInfo,
        size_bytes: u64,
    ) -> Option<ImageMetadata> {
        header.size_bytes = size_bytes;
        let extractor = self.extractor;
        let mime_type = mime_type.map(str::to_string);

        // Segment parsing is CPU-bound.
        match tokio::task::spawn_blocking(move || extractor.extract(mime_type.as_deref(), header)).await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(error = %e, "Metadata extraction task failed");
                None
            }
        }
    }
}

async fn put_stream(backend: &dyn Storage, key: &str, source: UploadStream) -> StorageResult<PutAck> {
    backend.put(key, Box::pin(StreamReader::new(source))).await
}

/// Consume the inspection branch until the scanner has what it needs, then detach.
async fn scan_headers(mut inspect: mpsc::Receiver<bytes::Bytes>, max_header_bytes: usize) -> HeaderInfo {
    let mut scanner = HeaderScanner::new(max_header_bytes);
    while let Some(chunk) = inspect.recv().await {
        if scanner.feed(&chunk) == ScanState::Complete {
            break;
        }
    }
    drop(inspect);
    scanner.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::fixtures;
    use bytes::Bytes;
    use std::io;
    use std::sync::Arc;
    use tempfile::tempdir;
    use vellum_storage::LocalStorage;

    fn chunked(data: Vec<u8>, chunk: usize) -> UploadStream {
        let chunks: Vec<io::Result<Bytes>> = data
            .chunks(chunk)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Box::pin(futures::stream::iter(chunks))
    }

    async fn pipeline(dir: &std::path::Path) -> IngestionPipeline {
        let local = LocalStorage::new(dir).await.unwrap();
        IngestionPipeline::new(StorageRegistry::new("local", Arc::new(local))).with_channel_capacity(2)
    }

    #[tokio::test]
    async fn test_jpeg_ingest_stores_every_byte_and_extracts() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(dir.path()).await;
        let data = fixtures::jpeg(1200, 800, true, None, 50_000);

        let outcome = pipeline
            .ingest(chunked(data.clone(), 4096), "local", "a.jpg", Some("image/jpeg"))
            .await
            .unwrap();

        assert_eq!(outcome.bytes_written(), 50_000);
        let metadata = outcome.metadata.unwrap();
        assert_eq!((metadata.width, metadata.height), (1200, 800));
        assert_eq!(metadata.filesize_bytes, 50_000);
        assert!(metadata.metadata.icc.is_some());
        assert!(metadata.metadata.exif.is_none());
        assert!(metadata.metadata.iptc.is_none());

        let stored = std::fs::read(dir.path().join("a.jpg")).unwrap();
        assert_eq!(stored, data);
    }

    #[tokio::test]
    async fn test_png_ingest() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(dir.path()).await;
        let data = fixtures::png(64, 32);

        let outcome = pipeline
            .ingest(chunked(data.clone(), 100), "local", "b.png", Some("image/png"))
            .await
            .unwrap();

        let metadata = outcome.metadata.unwrap();
        assert_eq!((metadata.width, metadata.height), (64, 32));
        assert_eq!(metadata.filesize_bytes, data.len() as u64);
    }

    #[tokio::test]
    async fn test_non_image_is_stored_without_metadata() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(dir.path()).await;

        let outcome = pipeline
            .ingest(chunked(b"%PDF-1.7 body".to_vec(), 3), "local", "doc.pdf", Some("application/pdf"))
            .await
            .unwrap();

        assert_eq!(outcome.bytes_written(), 13);
        assert!(outcome.metadata.is_none());
    }

    #[tokio::test]
    async fn test_undecodable_image_is_still_stored() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(dir.path()).await;
        let data = vec![0x42u8; 10_000];

        let outcome = pipeline
            .ingest(chunked(data, 512), "local", "broken.jpg", Some("image/jpeg"))
            .await
            .unwrap();

        assert_eq!(outcome.bytes_written(), 10_000);
        assert!(outcome.metadata.is_none());
    }

    #[tokio::test]
    async fn test_source_failure_fails_ingest() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(dir.path()).await;
        let source: UploadStream = Box::pin(futures::stream::iter(vec![
            Ok(Bytes::from_static(&[0xff, 0xd8, 0xff, 0xe0])),
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated upload")),
        ]));

        let result = pipeline.ingest(source, "local", "c.jpg", Some("image/jpeg")).await;
        assert!(result.is_err());
        assert!(!dir.path().join("c.jpg").exists());
    }

    #[tokio::test]
    async fn test_unknown_location_is_rejected() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(dir.path()).await;

        let result = pipeline
            .ingest(chunked(vec![1, 2, 3], 1), "tape", "d.bin", None)
            .await;
        assert!(matches!(
            result,
            Err(vellum_storage::StorageError::UnknownLocation(_))
        ));
    }

    #[tokio::test]
    async fn test_replace_overwrites_content() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(dir.path()).await;
        pipeline
            .ingest(chunked(b"first".to_vec(), 2), "local", "e.txt", Some("text/plain"))
            .await
            .unwrap();

        let ack = pipeline
            .replace(chunked(b"second!".to_vec(), 2), "local", "e.txt")
            .await
            .unwrap();

        assert_eq!(ack.bytes_written, 7);
        assert_eq!(std::fs::read(dir.path().join("e.txt")).unwrap(), b"second!");
    }
}
