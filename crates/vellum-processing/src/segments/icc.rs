//! ICC colour profile parsing.
//!
//! Reads the fixed 128-byte profile header and the `desc`/`cprt` tags. Both the
//! v2 text encodings (`desc`, `text`) and the v4 multi-localized `mluc` encoding
//! are understood; other tag types are ignored.

use std::io::Read;

use flate2::read::ZlibDecoder;
use vellum_core::models::IccProfile;

use super::{be_u16, be_u32};
use crate::metadata::ExtractionError;

const HEADER_LEN: usize = 128;
const SEGMENT: &str = "ICC";

/// Largest profile accepted from a compressed PNG `iCCP` chunk.
pub const MAX_PROFILE_BYTES: usize = 16 * 1024 * 1024;

/// Inflate the zlib-compressed profile carried by a PNG `iCCP` chunk body
/// (profile name, NUL, compression method, compressed data).
pub fn inflate_png_profile(chunk: &[u8]) -> Result<Vec<u8>, ExtractionError> {
    inflate_with_limit(chunk, MAX_PROFILE_BYTES)
}

fn inflate_with_limit(chunk: &[u8], limit: usize) -> Result<Vec<u8>, ExtractionError> {
    let name_end = chunk
        .iter()
        .position(|&b| b == 0)
        .ok_or(ExtractionError::Truncated("iCCP"))?;
    let method = *chunk
        .get(name_end + 1)
        .ok_or(ExtractionError::Truncated("iCCP"))?;
    if method != 0 {
        return Err(ExtractionError::Malformed {
            segment: "iCCP",
            reason: format!("unknown compression method {}", method),
        });
    }

    let mut profile = Vec::new();
    ZlibDecoder::new(&chunk[name_end + 2..])
        .take(limit as u64 + 1)
        .read_to_end(&mut profile)?;
    if profile.len() > limit {
        return Err(ExtractionError::Malformed {
            segment: "iCCP",
            reason: format!("profile inflates past {} bytes", limit),
        });
    }
    Ok(profile)
}

pub fn parse(data: &[u8]) -> Result<IccProfile, ExtractionError> {
    if data.len() < HEADER_LEN {
        return Err(ExtractionError::Truncated(SEGMENT));
    }
    if &data[36..40] != b"acsp" {
        return Err(ExtractionError::InvalidSignature(SEGMENT));
    }

    let size = be_u32(data, 0).ok_or(ExtractionError::Truncated(SEGMENT))?;
    let intent = be_u32(data, 64).ok_or(ExtractionError::Truncated(SEGMENT))?;

    Ok(IccProfile {
        size,
        version: format!("{}.{}.{}", data[8], data[9] >> 4, data[9] & 0x0f),
        device_class: device_class(&data[12..16]),
        color_space: signature(&data[16..20]).unwrap_or_default(),
        connection_space: signature(&data[20..24]).unwrap_or_default(),
        rendering_intent: rendering_intent(intent & 0xffff).to_string(),
        cmm: signature(&data[4..8]),
        platform: signature(&data[40..44]).map(|p| platform(&p)),
        creator: signature(&data[80..84]),
        description: find_tag(data, b"desc").and_then(read_text),
        copyright: find_tag(data, b"cprt").and_then(read_text),
    })
}

/// Four-character signature with padding removed; `None` when blank.
fn signature(bytes: &[u8]) -> Option<String> {
    let sig = String::from_utf8_lossy(bytes);
    let sig = sig.trim_matches(|c: char| c == ' ' || c == '\0');
    (!sig.is_empty()).then(|| sig.to_string())
}

fn device_class(bytes: &[u8]) -> String {
    match bytes {
        b"scnr" => "Scanner".to_string(),
        b"mntr" => "Monitor".to_string(),
        b"prtr" => "Printer".to_string(),
        b"link" => "Link".to_string(),
        b"abst" => "Abstract".to_string(),
        b"spac" => "Space".to_string(),
        b"nmcl" => "Named color".to_string(),
        other => signature(other).unwrap_or_default(),
    }
}

fn platform(sig: &str) -> String {
    match sig {
        "APPL" => "Apple".to_string(),
        "MSFT" => "Microsoft".to_string(),
        "SGI" => "Silicon Graphics".to_string(),
        "SUNW" => "Sun Microsystems".to_string(),
        other => other.to_string(),
    }
}

fn rendering_intent(value: u32) -> &'static str {
    match value {
        0 => "Perceptual",
        1 => "Relative",
        2 => "Saturation",
        3 => "Absolute",
        _ => "Unknown",
    }
}

/// Locate a tag's data in the tag table that follows the header.
fn find_tag<'a>(data: &'a [u8], sig: &[u8; 4]) -> Option<&'a [u8]> {
    // Entries past the end of the data cannot match.
    let declared = be_u32(data, HEADER_LEN)? as usize;
    let count = declared.min(data.len().saturating_sub(HEADER_LEN + 4) / 12);
    (0..count).find_map(|i| {
        let entry = HEADER_LEN + 4 + i * 12;
        if data.get(entry..entry + 4)? != sig {
            return None;
        }
        let offset = be_u32(data, entry + 4)? as usize;
        let len = be_u32(data, entry + 8)? as usize;
        data.get(offset..offset.checked_add(len)?)
    })
}

fn read_text(tag: &[u8]) -> Option<String> {
    let text = match tag.get(0..4)? {
        b"desc" => {
            let len = be_u32(tag, 8)? as usize;
            let ascii = tag.get(12..12usize.checked_add(len)?)?;
            String::from_utf8_lossy(ascii).into_owned()
        }
        b"text" => String::from_utf8_lossy(tag.get(8..)?).into_owned(),
        b"mluc" => {
            let records = be_u32(tag, 8)?;
            if records == 0 {
                return None;
            }
            // First record: language, country, length, offset from tag start.
            let len = be_u32(tag, 20)? as usize;
            let offset = be_u32(tag, 24)? as usize;
            let raw = tag.get(offset..offset.checked_add(len)?)?;
            let units: Vec<u16> = (0..raw.len() / 2).filter_map(|i| be_u16(raw, i * 2)).collect();
            String::from_utf16_lossy(&units)
        }
        _ => return None,
    };

    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    (!text.is_empty()).then(|| text.to_string())
}
