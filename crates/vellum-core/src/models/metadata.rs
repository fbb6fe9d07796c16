//! Embedded image metadata stored on a file record.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Parsed embedded blocks. Each one is present only if the source bytes carried it
/// and it parsed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icc: Option<IccProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exif: Option<ExifData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iptc: Option<IptcData>,
}

impl FileMetadata {
    pub fn is_empty(&self) -> bool {
        self.icc.is_none() && self.exif.is_none() && self.iptc.is_none()
    }
}

/// ICC colour profile header and descriptive tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IccProfile {
    pub size: u32,
    pub version: String,
    pub device_class: String,
    pub color_space: String,
    pub connection_space: String,
    pub rendering_intent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
}

/// EXIF fields grouped by the directory they were read from, keyed by tag name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExifData {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub image: BTreeMap<String, JsonValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub thumbnail: BTreeMap<String, JsonValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub exif: BTreeMap<String, JsonValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub gps: BTreeMap<String, JsonValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub interop: BTreeMap<String, JsonValue>,
}

impl ExifData {
    pub fn is_empty(&self) -> bool {
        self.image.is_empty()
            && self.thumbnail.is_empty()
            && self.exif.is_empty()
            && self.gps.is_empty()
            && self.interop.is_empty()
    }
}

/// IPTC-IIM application record (record 2) datasets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IptcData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_metadata_serializes_to_empty_object() {
        let metadata = FileMetadata::default();
        assert!(metadata.is_empty());
        assert_eq!(serde_json::to_string(&metadata).unwrap(), "{}");
    }

    #[test]
    fn test_only_present_blocks_are_serialized() {
        let metadata = FileMetadata {
            iptc: Some(IptcData {
                headline: Some("Harbour at dawn".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let json = serde_json::to_value(&metadata).unwrap();
        assert!(json.get("icc").is_none());
        assert!(json.get("exif").is_none());
        assert_eq!(json["iptc"]["headline"], "Harbour at dawn");
        assert!(json["iptc"].get("keywords").is_none());
    }
}
