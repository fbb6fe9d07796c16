//! Asset link resolution.
//!
//! Links are computed on every read from the record and the public URL
//! configuration; nothing here is persisted or cached.

use uuid::Uuid;
use vellum_core::constants::{ASSETS_PATH, ASSET_KEY_PARAM};
use vellum_core::models::{system_asset_sizes, AssetSize, FileLinks, FileRecord, ThumbnailLink};
use vellum_core::LinkConfig;

#[derive(Debug, Clone)]
pub struct AssetLinkResolver {
    config: LinkConfig,
}

impl AssetLinkResolver {
    pub fn new(config: LinkConfig) -> Self {
        Self { config }
    }

    /// System sizes followed by the administrator's sizes. Entries are only ever
    /// added; duplicate keys are kept as configured.
    pub fn allowed_sizes(&self, configured: impl IntoIterator<Item = AssetSize>) -> Vec<AssetSize> {
        let mut sizes = system_asset_sizes();
        sizes.extend(configured);
        sizes
    }

    pub fn asset_url(&self, id: Uuid) -> String {
        format!(
            "{}/{}/{}",
            self.config.public_url.trim_end_matches('/'),
            ASSETS_PATH,
            id
        )
    }

    pub fn thumbnail_url(&self, id: Uuid, key: &str) -> String {
        format!(
            "{}?{}={}",
            self.asset_url(id),
            ASSET_KEY_PARAM,
            urlencoding::encode(key)
        )
    }

    /// Direct URL of the stored bytes, if the file's storage location is public.
    pub fn original_url(&self, file: &FileRecord) -> Option<String> {
        let base = self.config.backend_public_urls.get(&file.storage)?;
        Some(format!(
            "{}/{}",
            base.trim_end_matches('/'),
            urlencoding::encode(&file.filename_disk)
        ))
    }

    pub fn resolve(&self, file: &FileRecord, sizes: &[AssetSize]) -> FileLinks {
        FileLinks {
            asset_url: self.asset_url(file.id),
            original_url: self.original_url(file),
            thumbnails: sizes
                .iter()
                .map(|size| ThumbnailLink {
                    size: size.clone(),
                    url: self.thumbnail_url(file.id, &size.key),
                })
                .collect(),
        }
    }
}
