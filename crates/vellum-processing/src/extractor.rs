//! Metadata extraction from scanned image headers.

use vellum_core::models::FileMetadata;

use crate::header::HeaderInfo;
use crate::metadata::ImageMetadata;
use crate::segments::{exif, icc, iptc};

/// Whether a mime type is image-like and therefore subject to extraction.
pub fn is_image_mime(mime_type: Option<&str>) -> bool {
    mime_type
        .map(|m| m.trim().to_ascii_lowercase().starts_with("image/"))
        .unwrap_or(false)
}

/// Turns [`HeaderInfo`] into an [`ImageMetadata`] record.
///
/// Every embedded segment is parsed on its own: a segment that fails to parse is
/// logged and left out, and the remaining segments are still reported.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataExtractor;

impl MetadataExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Returns `None` for non-image mime types (without looking at `header`) and for
    /// images whose dimensions could not be decoded.
    pub fn extract(&self, mime_type: Option<&str>, header: HeaderInfo) -> Option<ImageMetadata> {
        if !is_image_mime(mime_type) {
            return None;
        }

        let (Some(width), Some(height)) = (header.width, header.height) else {
            tracing::warn!(
                mime_type = mime_type.unwrap_or_default(),
                format = header.format.as_deref().unwrap_or("unknown"),
                "Image dimensions could not be decoded, skipping metadata"
            );
            return None;
        };

        let icc_raw = header.icc.or_else(|| {
            header.png_iccp.as_deref().and_then(|chunk| {
                icc::inflate_png_profile(chunk)
                    .map_err(|e| tracing::warn!(error = %e, segment = "icc", "Failed to inflate PNG iCCP chunk"))
                    .ok()
            })
        });

        let metadata = FileMetadata {
            icc: icc_raw.as_deref().and_then(|raw| {
                icc::parse(raw)
                    .map_err(|e| tracing::warn!(error = %e, segment = "icc", "Failed to parse embedded segment"))
                    .ok()
            }),
            exif: header.exif.as_deref().and_then(|raw| {
                exif::parse(raw)
                    .map_err(|e| tracing::warn!(error = %e, segment = "exif", "Failed to parse embedded segment"))
                    .ok()
                    .filter(|exif| !exif.is_empty())
            }),
            iptc: header.iptc.as_deref().and_then(|raw| {
                iptc::parse(raw)
                    .map_err(|e| tracing::warn!(error = %e, segment = "iptc", "Failed to parse embedded segment"))
                    .ok()
            }),
        };

        tracing::debug!(
            width,
            height,
            size_bytes = header.size_bytes,
            icc = metadata.icc.is_some(),
            exif = metadata.exif.is_some(),
            iptc = metadata.iptc.is_some(),
            "Image metadata extracted"
        );

        Some(ImageMetadata {
            width,
            height,
            filesize_bytes: header.size_bytes,
            format: header.format,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments;

    fn header() -> HeaderInfo {
        HeaderInfo {
            format: Some("jpeg".to_string()),
            width: Some(1200),
            height: Some(800),
            size_bytes: 50_000,
            ..Default::default()
        }
    }

    #[test]
    fn test_is_image_mime() {
        assert!(is_image_mime(Some("image/jpeg")));
        assert!(is_image_mime(Some(" IMAGE/PNG")));
        assert!(!is_image_mime(Some("application/pdf")));
        assert!(!is_image_mime(None));
    }

    #[test]
    fn test_non_image_is_skipped() {
        assert_eq!(MetadataExtractor.extract(Some("application/pdf"), header()), None);
        assert_eq!(MetadataExtractor.extract(None, header()), None);
    }

    #[test]
    fn test_dimensions_and_size_without_segments() {
        let metadata = MetadataExtractor.extract(Some("image/jpeg"), header()).unwrap();
        assert_eq!((metadata.width, metadata.height), (1200, 800));
        assert_eq!(metadata.filesize_bytes, 50_000);
        assert!(metadata.metadata.is_empty());
    }

    #[test]
    fn test_missing_dimensions_yield_nothing() {
        let mut info = header();
        info.height = None;
        assert_eq!(MetadataExtractor.extract(Some("image/jpeg"), info), None);
    }

    #[test]
    fn test_broken_segment_does_not_hide_the_others() {
        let mut info = header();
        info.icc = Some(vec![0u8; 12]);
        info.exif = Some(segments::exif::tests::sample_exif());
        info.iptc = Some(segments::iptc::tests::sample_iim("Harbour at dawn"));

        let metadata = MetadataExtractor.extract(Some("image/jpeg"), info).unwrap();
        assert!(metadata.metadata.icc.is_none());
        assert!(metadata.metadata.exif.is_some());
        assert_eq!(metadata.headline(), Some("Harbour at dawn"));
    }

    #[test]
    fn test_icc_parses_while_truncated_iptc_is_dropped() {
        let mut info = header();
        info.icc = Some(segments::icc::tests::sample_profile());
        info.iptc = Some(vec![0x1c, 2]);

        let metadata = MetadataExtractor.extract(Some("image/png"), info).unwrap();
        assert_eq!(
            metadata.metadata.icc.as_ref().map(|p| p.color_space.as_str()),
            Some("RGB")
        );
        assert!(metadata.metadata.iptc.is_none());
    }

    #[test]
    fn test_png_iccp_is_inflated_and_parsed() {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&segments::icc::tests::sample_profile()).unwrap();
        let mut chunk = b"ICC Profile\0\0".to_vec();
        chunk.extend_from_slice(&encoder.finish().unwrap());

        let mut info = header();
        info.png_iccp = Some(chunk);
        let metadata = MetadataExtractor.extract(Some("image/png"), info).unwrap();
        assert_eq!(
            metadata.metadata.icc.and_then(|p| p.description),
            Some("sRGB test profile".to_string())
        );
    }

    #[test]
    fn test_undecodable_iccp_is_dropped() {
        let mut info = header();
        info.png_iccp = Some(b"ICC Profile\0\x07garbage".to_vec());
        info.exif = Some(segments::exif::tests::sample_exif());

        let metadata = MetadataExtractor.extract(Some("image/png"), info).unwrap();
        assert!(metadata.metadata.icc.is_none());
        assert!(metadata.metadata.exif.is_some());
    }
}
