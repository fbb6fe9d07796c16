//! Two-way split of an upload stream.
//!
//! One source stream is read exactly once and each chunk is forwarded to two bounded
//! channels: the storage branch, which receives every byte unmodified, and the
//! inspection branch, which receives chunks only for as long as its consumer keeps
//! the receiver alive. Dropping the inspection receiver detaches that branch without
//! interrupting storage; dropping the storage reader stops the source.

use std::io;
use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::StreamReader;

/// Source of upload bytes.
pub type UploadStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Reader over the storage branch.
pub type StorageReader = Pin<Box<dyn AsyncRead + Send + Unpin>>;

/// Totals reported by the driver once the source is exhausted or abandoned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeeSummary {
    pub bytes_read: u64,
    /// Bytes also delivered to the inspection branch before it detached.
    pub bytes_inspected: u64,
    /// The source yielded an error, which was forwarded to the storage branch.
    pub source_failed: bool,
    /// The storage branch went away before the source was exhausted.
    pub storage_closed: bool,
}

/// The two halves of a tee plus the driver future that moves bytes between them.
pub struct Tee {
    pub storage: StorageReader,
    pub inspect: mpsc::Receiver<Bytes>,
    pub driver: Pin<Box<dyn std::future::Future<Output = TeeSummary> + Send>>,
}

/// Split `source` into a storage reader and an inspection channel, each buffering at
/// most `capacity` chunks. Nothing moves until `driver` is polled.
pub fn tee(source: UploadStream, capacity: usize) -> Tee {
    let capacity = capacity.max(1);
    let (storage_tx, storage_rx) = mpsc::channel::<io::Result<Bytes>>(capacity);
    let (inspect_tx, inspect_rx) = mpsc::channel::<Bytes>(capacity);

    Tee {
        storage: Box::pin(StreamReader::new(ReceiverStream::new(storage_rx))),
        inspect: inspect_rx,
        driver: Box::pin(drive(source, storage_tx, inspect_tx)),
    }
}

async fn drive(
    mut source: UploadStream,
    storage_tx: mpsc::Sender<io::Result<Bytes>>,
    inspect_tx: mpsc::Sender<Bytes>,
) -> TeeSummary {
    let mut summary = TeeSummary::default();
    let mut inspect_tx = Some(inspect_tx);

    while let Some(item) = source.next().await {
        let chunk = match item {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(error = %e, bytes_read = summary.bytes_read, "Upload stream failed");
                summary.source_failed = true;
                // Storage sees the error and aborts its write.
                let _ = storage_tx.send(Err(e)).await;
                break;
            }
        };
        summary.bytes_read += chunk.len() as u64;

        if let Some(tx) = &inspect_tx {
            // Bytes clones share the allocation.
            if tx.send(chunk.clone()).await.is_ok() {
                summary.bytes_inspected += chunk.len() as u64;
            } else {
                tracing::debug!(
                    bytes_inspected = summary.bytes_inspected,
                    "Inspection branch detached"
                );
                inspect_tx = None;
            }
        }

        if storage_tx.send(Ok(chunk)).await.is_err() {
            summary.storage_closed = true;
            break;
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn source(chunks: Vec<io::Result<&'static [u8]>>) -> UploadStream {
        Box::pin(futures::stream::iter(
            chunks
                .into_iter()
                .map(|c| c.map(Bytes::from_static))
                .collect::<Vec<_>>(),
        ))
    }

    #[tokio::test]
    async fn test_both_branches_see_every_byte() {
        let Tee {
            mut storage,
            mut inspect,
            driver,
        } = tee(source(vec![Ok(b"abc"), Ok(b"def"), Ok(b"g")]), 1);

        let read_storage = async {
            let mut out = Vec::new();
            storage.read_to_end(&mut out).await.unwrap();
            out
        };
        let read_inspect = async {
            let mut out = Vec::new();
            while let Some(chunk) = inspect.recv().await {
                out.extend_from_slice(&chunk);
            }
            out
        };

        let (summary, stored, inspected) = tokio::join!(driver, read_storage, read_inspect);
        assert_eq!(stored, b"abcdefg");
        assert_eq!(inspected, b"abcdefg");
        assert_eq!(summary.bytes_read, 7);
        assert!(!summary.source_failed && !summary.storage_closed);
    }

    #[tokio::test]
    async fn test_detached_inspection_does_not_stall_storage() {
        let chunks: Vec<io::Result<&'static [u8]>> = (0..64).map(|_| Ok(&b"0123456789"[..])).collect();
        let Tee {
            mut storage,
            mut inspect,
            driver,
        } = tee(source(chunks), 2);

        let read_storage = async {
            let mut out = Vec::new();
            storage.read_to_end(&mut out).await.unwrap();
            out.len()
        };
        let read_one_then_stop = async move {
            let first = inspect.recv().await;
            drop(inspect);
            first.map(|c| c.len())
        };

        let (summary, stored, first) = tokio::join!(driver, read_storage, read_one_then_stop);
        assert_eq!(stored, 640);
        assert_eq!(first, Some(10));
        assert_eq!(summary.bytes_read, 640);
        assert!(summary.bytes_inspected < 640);
    }

    #[tokio::test]
    async fn test_source_error_reaches_storage() {
        let Tee {
            mut storage,
            inspect,
            driver,
        } = tee(
            source(vec![
                Ok(b"partial"),
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "client went away")),
            ]),
            4,
        );
        drop(inspect);

        let read_storage = async {
            let mut out = Vec::new();
            storage.read_to_end(&mut out).await
        };

        let (summary, result) = tokio::join!(driver, read_storage);
        assert!(summary.source_failed);
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::ConnectionReset);
    }

    #[tokio::test]
    async fn test_closed_storage_stops_the_source() {
        let chunks: Vec<io::Result<&'static [u8]>> = (0..16).map(|_| Ok(&b"xx"[..])).collect();
        let Tee {
            storage,
            inspect,
            driver,
        } = tee(source(chunks), 1);
        drop(storage);
        drop(inspect);

        let summary = driver.await;
        assert!(summary.storage_closed);
        assert_eq!(summary.bytes_read, 2);
    }
}
