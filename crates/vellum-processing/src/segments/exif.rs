//! EXIF parsing on top of kamadak-exif.
//!
//! Fields are grouped by the directory they were read from: the primary image IFD,
//! the thumbnail IFD, and the Exif, GPS and interoperability sub-IFDs.

use ::exif::{Context, Field, In, Reader, Tag, Value};
use serde_json::{Number, Value as JsonValue};
use vellum_core::models::ExifData;

use crate::metadata::ExtractionError;

/// Parse a TIFF-structured EXIF block (the APP1 payload after `Exif\0\0`, or a PNG `eXIf` chunk).
pub fn parse(data: &[u8]) -> Result<ExifData, ExtractionError> {
    let exif = Reader::new().read_raw(data.to_vec())?;

    let mut out = ExifData::default();
    for field in exif.fields() {
        // Opaque vendor blob; rendering it is noise.
        if field.tag == Tag::MakerNote {
            continue;
        }

        let group = match field.tag.context() {
            Context::Tiff if field.ifd_num == In::PRIMARY => &mut out.image,
            Context::Tiff => &mut out.thumbnail,
            Context::Exif => &mut out.exif,
            Context::Gps => &mut out.gps,
            Context::Interop => &mut out.interop,
            #[allow(unreachable_patterns)]
            _ => continue,
        };
        group.insert(field.tag.to_string(), field_to_json(field));
    }

    Ok(out)
}

fn field_to_json(field: &Field) -> JsonValue {
    match &field.value {
        Value::Byte(v) => collapse(v.iter().map(|&n| JsonValue::from(n))),
        Value::SByte(v) => collapse(v.iter().map(|&n| JsonValue::from(n))),
        Value::Short(v) => collapse(v.iter().map(|&n| JsonValue::from(n))),
        Value::SShort(v) => collapse(v.iter().map(|&n| JsonValue::from(n))),
        Value::Long(v) => collapse(v.iter().map(|&n| JsonValue::from(n))),
        Value::SLong(v) => collapse(v.iter().map(|&n| JsonValue::from(n))),
        Value::Rational(v) => collapse(v.iter().map(|r| float(r.to_f64()))),
        Value::SRational(v) => collapse(v.iter().map(|r| float(r.to_f64()))),
        Value::Float(v) => collapse(v.iter().map(|&f| float(f64::from(f)))),
        Value::Double(v) => collapse(v.iter().map(|&f| float(f))),
        Value::Ascii(v) => collapse(v.iter().map(|s| {
            let s = String::from_utf8_lossy(s);
            JsonValue::String(s.trim_end_matches('\0').trim_end().to_string())
        })),
        _ => JsonValue::String(field.display_value().to_string()),
    }
}

fn float(f: f64) -> JsonValue {
    Number::from_f64(f)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

/// Single values are stored as scalars, multi-valued fields as arrays.
fn collapse(values: impl Iterator<Item = JsonValue>) -> JsonValue {
    let mut values: Vec<JsonValue> = values.collect();
    if values.len() == 1 {
        values.remove(0)
    } else {
        JsonValue::Array(values)
    }
}
