//! Asset size descriptors and the computed link set.

use serde::{Deserialize, Serialize};

/// How a derived image is fitted into the requested box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetFit {
    #[default]
    Cover,
    Contain,
    Inside,
    Outside,
    Fill,
}

/// A permitted derived-image size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSize {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default)]
    pub fit: AssetFit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
}

impl AssetSize {
    pub fn new(key: impl Into<String>, width: Option<u32>, height: Option<u32>, fit: AssetFit) -> Self {
        Self {
            key: key.into(),
            width,
            height,
            fit,
            quality: None,
        }
    }
}

/// Sizes the system always allows, whatever the administrator configured.
pub fn system_asset_sizes() -> Vec<AssetSize> {
    vec![
        AssetSize::new("system-small-cover", Some(64), Some(64), AssetFit::Cover),
        AssetSize::new("system-small-contain", Some(64), None, AssetFit::Contain),
        AssetSize::new("system-medium-cover", Some(300), Some(300), AssetFit::Cover),
        AssetSize::new("system-medium-contain", Some(300), None, AssetFit::Contain),
        AssetSize::new("system-large-cover", Some(800), Some(600), AssetFit::Cover),
        AssetSize::new("system-large-contain", Some(800), None, AssetFit::Contain),
    ]
}

/// One addressable derived size of a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailLink {
    #[serde(flatten)]
    pub size: AssetSize,
    pub url: String,
}

/// Links computed on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileLinks {
    pub asset_url: String,
    /// Absent when the file's storage location has no public URL configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,
    pub thumbnails: Vec<ThumbnailLink>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_sizes_have_unique_keys() {
        let sizes = system_asset_sizes();
        let mut keys: Vec<&str> = sizes.iter().map(|s| s.key.as_str()).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), sizes.len());
    }

    #[test]
    fn test_asset_size_fit_defaults_to_cover() {
        let size: AssetSize = serde_json::from_str(r#"{"key":"card","width":400}"#).unwrap();
        assert_eq!(size.fit, AssetFit::Cover);
        assert_eq!(size.height, None);
    }

    #[test]
    fn test_thumbnail_link_flattens_size() {
        let link = ThumbnailLink {
            size: AssetSize::new("card", Some(400), Some(200), AssetFit::Contain),
            url: "/assets/x?key=card".to_string(),
        };
        let json = serde_json::to_value(&link).unwrap();
        assert_eq!(json["key"], "card");
        assert_eq!(json["fit"], "contain");
        assert_eq!(json["url"], "/assets/x?key=card");
    }
}
