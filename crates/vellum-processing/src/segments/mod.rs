//! Parsers for embedded metadata segments.
//!
//! Each parser takes the raw bytes of one segment as found in the container (the ICC
//! profile after chunk reassembly, the TIFF-structured EXIF block, the IPTC-IIM
//! stream) and returns a typed record or an [`ExtractionError`](crate::ExtractionError).
//! Parsers are independent of each other.

pub mod exif;
pub mod icc;
pub mod iptc;

/// Read a big-endian u16 at `at`.
pub(crate) fn be_u16(data: &[u8], at: usize) -> Option<u16> {
    let bytes = data.get(at..at.checked_add(2)?)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Read a big-endian u32 at `at`.
pub(crate) fn be_u32(data: &[u8], at: usize) -> Option<u32> {
    let bytes = data.get(at..at.checked_add(4)?)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
