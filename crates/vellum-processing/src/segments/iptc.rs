//! IPTC-IIM parsing.
//!
//! JPEG files carry IPTC inside an APP13 Photoshop "Image Resource Block" list;
//! [`from_photoshop_irb`] pulls resource 0x0404 out of that list and [`parse`] reads
//! the application record (record 2) datasets from the resulting IIM stream.

use vellum_core::models::IptcData;

use super::{be_u16, be_u32};
use crate::metadata::ExtractionError;

const SEGMENT: &str = "IPTC";
const TAG_MARKER: u8 = 0x1c;
const APPLICATION_RECORD: u8 = 2;
const IPTC_RESOURCE_ID: u16 = 0x0404;

/// Extract the IPTC-IIM resource from a Photoshop IRB list (APP13 payload after the
/// `Photoshop 3.0\0` identifier).
pub fn from_photoshop_irb(data: &[u8]) -> Result<Vec<u8>, ExtractionError> {
    let mut pos = 0;
    while pos + 12 <= data.len() {
        if &data[pos..pos + 4] != b"8BIM" {
            return Err(ExtractionError::InvalidSignature("Photoshop IRB"));
        }
        let id = be_u16(data, pos + 4).ok_or(ExtractionError::Truncated("Photoshop IRB"))?;

        // Pascal name padded so that length byte + name is even.
        let name_len = data[pos + 6] as usize;
        let name_total = (1 + name_len + 1) & !1;
        let size_at = pos + 6 + name_total;
        let size = be_u32(data, size_at).ok_or(ExtractionError::Truncated("Photoshop IRB"))? as usize;
        let start = size_at + 4;
        let end = start
            .checked_add(size)
            .filter(|&end| end <= data.len())
            .ok_or(ExtractionError::Truncated("Photoshop IRB"))?;

        if id == IPTC_RESOURCE_ID {
            return Ok(data[start..end].to_vec());
        }
        pos = end + (size & 1);
    }

    Err(ExtractionError::Malformed {
        segment: "Photoshop IRB",
        reason: "no IPTC resource".to_string(),
    })
}

/// Parse an IPTC-IIM dataset stream.
pub fn parse(data: &[u8]) -> Result<IptcData, ExtractionError> {
    let mut iptc = IptcData::default();
    let mut found = false;
    let mut pos = 0;

    while pos < data.len() {
        if data[pos] != TAG_MARKER {
            // Trailing padding is common; anything else before the first tag is not IIM.
            if found && data[pos..].iter().all(|&b| b == 0) {
                break;
            }
            return Err(ExtractionError::InvalidSignature(SEGMENT));
        }

        let record = *data.get(pos + 1).ok_or(ExtractionError::Truncated(SEGMENT))?;
        let dataset = *data.get(pos + 2).ok_or(ExtractionError::Truncated(SEGMENT))?;
        let raw_len = be_u16(data, pos + 3).ok_or(ExtractionError::Truncated(SEGMENT))?;
        let mut start = pos + 5;

        // Extended dataset: the low 15 bits give the byte count of the real length.
        let len = if raw_len & 0x8000 != 0 {
            let count = (raw_len & 0x7fff) as usize;
            if count == 0 || count > 4 {
                return Err(ExtractionError::Malformed {
                    segment: SEGMENT,
                    reason: format!("unsupported extended length of {} bytes", count),
                });
            }
            let bytes = data
                .get(start..start + count)
                .ok_or(ExtractionError::Truncated(SEGMENT))?;
            start += count;
            bytes.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize)
        } else {
            raw_len as usize
        };

        let end = start
            .checked_add(len)
            .filter(|&end| end <= data.len())
            .ok_or(ExtractionError::Truncated(SEGMENT))?;

        found = true;
        if record == APPLICATION_RECORD {
            apply_dataset(&mut iptc, dataset, &data[start..end]);
        }
        pos = end;
    }

    if !found {
        return Err(ExtractionError::Truncated(SEGMENT));
    }
    Ok(iptc)
}

fn apply_dataset(iptc: &mut IptcData, dataset: u8, value: &[u8]) {
    let text = String::from_utf8_lossy(value)
        .trim_end_matches('\0')
        .trim()
        .to_string();
    if text.is_empty() {
        return;
    }

    match dataset {
        5 => iptc.object_name = Some(text),
        25 => iptc.keywords.push(text),
        55 => iptc.date_created = Some(text),
        80 => iptc.byline = Some(text),
        90 => iptc.city = Some(text),
        101 => iptc.country = Some(text),
        105 => iptc.headline = Some(text),
        110 => iptc.credit = Some(text),
        116 => iptc.copyright = Some(text),
        120 => iptc.caption = Some(text),
        _ => {}
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn dataset(record: u8, dataset: u8, value: &str) -> Vec<u8> {
        let mut out = vec![TAG_MARKER, record, dataset];
        out.extend_from_slice(&(value.len() as u16).to_be_bytes());
        out.extend_from_slice(value.as_bytes());
        out
    }

    /// IIM stream with a headline, caption and two keywords.
    pub(crate) fn sample_iim(headline: &str) -> Vec<u8> {
        let mut iim = dataset(1, 90, "\x1b%G");
        iim.extend(dataset(2, 0, "\x00\x04"));
        iim.extend(dataset(2, 105, headline));
        iim.extend(dataset(2, 120, "Fishing boats leaving at first light"));
        iim.extend(dataset(2, 25, "harbour"));
        iim.extend(dataset(2, 25, "boats"));
        iim
    }

    /// Wrap an IIM stream in a Photoshop IRB list, preceded by an unrelated resource.
    pub(crate) fn photoshop_irb(iim: &[u8]) -> Vec<u8> {
        let mut irb = b"8BIM".to_vec();
        irb.extend_from_slice(&0x03edu16.to_be_bytes());
        irb.extend_from_slice(&[0, 0]);
        irb.extend_from_slice(&3u32.to_be_bytes());
        irb.extend_from_slice(&[1, 2, 3, 0]);

        irb.extend_from_slice(b"8BIM");
        irb.extend_from_slice(&IPTC_RESOURCE_ID.to_be_bytes());
        irb.extend_from_slice(&[0, 0]);
        irb.extend_from_slice(&(iim.len() as u32).to_be_bytes());
        irb.extend_from_slice(iim);
        if iim.len() % 2 == 1 {
            irb.push(0);
        }
        irb
    }

    #[test]
    fn test_parse_application_record() {
        let iptc = parse(&sample_iim("Harbour at dawn")).unwrap();
        assert_eq!(iptc.headline.as_deref(), Some("Harbour at dawn"));
        assert_eq!(
            iptc.caption.as_deref(),
            Some("Fishing boats leaving at first light")
        );
        assert_eq!(iptc.keywords, vec!["harbour", "boats"]);
        assert_eq!(iptc.city, None);
    }

    #[test]
    fn test_extended_length_dataset() {
        let caption = "x".repeat(40);
        let mut iim = vec![TAG_MARKER, 2, 120, 0x80, 0x02, 0x00, 40];
        iim.extend_from_slice(caption.as_bytes());

        let iptc = parse(&iim).unwrap();
        assert_eq!(iptc.caption.as_deref(), Some(caption.as_str()));
    }

    #[test]
    fn test_trailing_padding_is_ignored() {
        let mut iim = dataset(2, 105, "Padded");
        iim.extend_from_slice(&[0, 0, 0]);
        assert_eq!(parse(&iim).unwrap().headline.as_deref(), Some("Padded"));
    }

    #[test]
    fn test_truncated_dataset_is_an_error() {
        let mut iim = dataset(2, 105, "Headline");
        iim.truncate(iim.len() - 3);
        assert!(matches!(parse(&iim), Err(ExtractionError::Truncated(_))));
        assert!(parse(b"garbage").is_err());
    }

    #[test]
    fn test_photoshop_irb_lookup() {
        let iim = sample_iim("Odd");
        let irb = photoshop_irb(&iim);
        assert_eq!(from_photoshop_irb(&irb).unwrap(), iim);

        let mut no_iptc = b"8BIM".to_vec();
        no_iptc.extend_from_slice(&0x03edu16.to_be_bytes());
        no_iptc.extend_from_slice(&[0, 0, 0, 0, 0, 2, 9, 9]);
        assert!(from_photoshop_irb(&no_iptc).is_err());
    }
}
