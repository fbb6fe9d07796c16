//! Test helpers: build a FileService over a temporary local storage root.
//!
//! Run from workspace root: `cargo test -p vellum-services --test files_test`.

#![allow(dead_code)]

pub mod fixtures;
pub mod storage;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value as JsonValue;
use tempfile::TempDir;
use vellum_core::models::AssetSize;
use vellum_core::LinkConfig;
use vellum_services::{
    AssetLinkResolver, FileService, IngestionPipeline, Item, PassthroughPayload, StaticSettings,
    Storage, StorageRegistry, UploadStream,
};
use vellum_storage::LocalStorage;

use storage::{FlakyItems, FlakyStorage};

pub const PUBLIC_URL: &str = "https://cdn.example.com";
pub const LOCAL_PUBLIC_URL: &str = "https://files.example.com/uploads";

/// Service under test plus handles on its collaborators.
pub struct TestApp {
    pub service: FileService,
    pub items: Arc<FlakyItems>,
    pub storage: Arc<FlakyStorage>,
    pub _temp_dir: TempDir,
    root: PathBuf,
}

impl TestApp {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stored(&self, filename_disk: &str) -> Option<Vec<u8>> {
        std::fs::read(self.root.join(filename_disk)).ok()
    }

    pub fn stored_count(&self) -> usize {
        std::fs::read_dir(&self.root)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

pub async fn setup_test_app() -> TestApp {
    setup_with_allowlist(Vec::new()).await
}

pub async fn setup_with_allowlist(allowlist: Vec<AssetSize>) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let root = temp_dir.path().join("local");
    let local = LocalStorage::new(root.clone())
        .await
        .expect("Failed to create local storage");
    let storage = Arc::new(FlakyStorage::new(local));
    let items = Arc::new(FlakyItems::default());

    let registry = StorageRegistry::new("local", storage.clone() as Arc<dyn Storage>);
    let pipeline = IngestionPipeline::new(registry).with_channel_capacity(4);
    let links = AssetLinkResolver::new(
        LinkConfig::new(PUBLIC_URL).with_backend_url("local", LOCAL_PUBLIC_URL),
    );

    let service = FileService::new(
        items.clone(),
        Arc::new(PassthroughPayload),
        Arc::new(StaticSettings::new(allowlist)),
        pipeline,
        links,
    );

    TestApp {
        service,
        items,
        storage,
        _temp_dir: temp_dir,
        root,
    }
}

/// Upload stream yielding `data` in `chunk`-sized pieces.
pub fn stream(data: &[u8], chunk: usize) -> UploadStream {
    let chunks: Vec<io::Result<Bytes>> = data
        .chunks(chunk)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    Box::pin(futures::stream::iter(chunks))
}

pub fn payload(value: JsonValue) -> Item {
    value
        .as_object()
        .cloned()
        .expect("Payload fixture must be a JSON object")
}
