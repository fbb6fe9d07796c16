use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use super::asset::FileLinks;
use super::metadata::FileMetadata;

/// Persisted file record.
///
/// `filename_disk` is always `{id}{extension}` and is set once at creation.
/// `storage` names the storage location that holds the bytes; moving a file to
/// another location is not supported by the lifecycle service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,
    pub storage: String,
    pub filename_disk: String,
    pub filename_download: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesize_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<FileMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_on: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_on: Option<DateTime<Utc>>,
    /// Fields owned by the persistence collaborator (tags, folder, ...), carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl FileRecord {
    /// Build a typed record from a collaborator item.
    pub fn from_item(item: Map<String, JsonValue>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(JsonValue::Object(item))
    }
}

/// A file record with its computed links attached (read path only, never persisted).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileWithLinks {
    #[serde(flatten)]
    pub file: FileRecord,
    pub links: FileLinks,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_item() -> Map<String, JsonValue> {
        json!({
            "id": "6f1c2b3a-4d5e-4f60-8a7b-9c0d1e2f3a4b",
            "storage": "local",
            "filename_disk": "6f1c2b3a-4d5e-4f60-8a7b-9c0d1e2f3a4b.pdf",
            "filename_download": "doc.pdf",
            "mime_type": "application/pdf",
            "tags": ["contract"],
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn test_from_item_keeps_unknown_fields() {
        let record = FileRecord::from_item(sample_item()).unwrap();
        assert_eq!(record.filename_download, "doc.pdf");
        assert_eq!(record.extra.get("tags"), Some(&json!(["contract"])));
        assert_eq!(record.mime_type.as_deref(), Some("application/pdf"));
    }

    #[test]
    fn test_absent_image_fields_are_not_serialized() {
        let record = FileRecord::from_item(sample_item()).unwrap();
        let value = serde_json::to_value(&record).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("width"));
        assert!(!object.contains_key("height"));
        assert!(!object.contains_key("metadata"));
        assert_eq!(object.get("tags"), Some(&json!(["contract"])));
    }
}
