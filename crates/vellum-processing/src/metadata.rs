//! Image metadata types produced by extraction

use serde::{Deserialize, Serialize};
use vellum_core::models::FileMetadata;

/// Result of a successful extraction for an image upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub filesize_bytes: u64,
    /// Detected container format ("jpeg", "png", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Embedded blocks that were present and parsed.
    #[serde(default)]
    pub metadata: FileMetadata,
}

impl ImageMetadata {
    pub fn headline(&self) -> Option<&str> {
        self.metadata
            .iptc
            .as_ref()
            .and_then(|iptc| iptc.headline.as_deref())
    }

    pub fn caption(&self) -> Option<&str> {
        self.metadata
            .iptc
            .as_ref()
            .and_then(|iptc| iptc.caption.as_deref())
    }
}

/// Failure to parse one embedded segment. Contained by the extractor, which logs it
/// and treats the segment as absent.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("{0} segment is truncated")]
    Truncated(&'static str),

    #[error("{0} segment has an invalid signature")]
    InvalidSignature(&'static str),

    #[error("{segment} segment is malformed: {reason}")]
    Malformed {
        segment: &'static str,
        reason: String,
    },

    #[error("failed to inflate compressed profile: {0}")]
    Decompress(#[from] std::io::Error),

    #[error("EXIF parsing failed: {0}")]
    Exif(#[from] exif::Error),
}
