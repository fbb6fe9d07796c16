//! Vellum Processing Library
//!
//! This crate implements streaming ingestion of uploads: the tee that feeds one
//! upload stream to a storage backend and to a header scanner at the same time,
//! the incremental header scanner itself, the ICC/EXIF/IPTC segment parsers and
//! the extractor that assembles their output into image metadata.

pub mod extractor;
pub mod header;
pub mod metadata;
pub mod pipeline;
pub mod segments;
pub mod tee;

pub use extractor::{is_image_mime, MetadataExtractor};
pub use header::{HeaderInfo, HeaderScanner, ScanState};
pub use metadata::{ExtractionError, ImageMetadata};
pub use pipeline::{IngestOutcome, IngestionPipeline};
pub use tee::{tee, Tee, TeeSummary, UploadStream};
