//! Collaborators with switchable failures.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::io::AsyncRead;
use uuid::Uuid;
use vellum_core::models::Query;
use vellum_core::{AppError, StorageDriver};
use vellum_services::{Item, ItemsService, MemoryItems};
use vellum_storage::{
    ByteStream, DeleteOutcome, LocalStorage, PutAck, Storage, StorageError, StorageResult,
};

/// Local storage whose writes and deletes can be made to fail.
pub struct FlakyStorage {
    inner: LocalStorage,
    fail_put: AtomicBool,
    fail_delete: AtomicBool,
}

impl FlakyStorage {
    pub fn new(inner: LocalStorage) -> Self {
        Self {
            inner,
            fail_put: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        }
    }

    pub fn fail_put(&self, fail: bool) {
        self.fail_put.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Storage for FlakyStorage {
    async fn put(
        &self,
        key: &str,
        reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<PutAck> {
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(StorageError::UploadFailed(format!("disk full writing {}", key)));
        }
        self.inner.put(key, reader).await
    }

    async fn delete(&self, key: &str) -> StorageResult<DeleteOutcome> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StorageError::DeleteFailed(format!("permission denied: {}", key)));
        }
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn content_length(&self, key: &str) -> StorageResult<u64> {
        self.inner.content_length(key).await
    }

    async fn download_stream(&self, key: &str) -> StorageResult<ByteStream> {
        self.inner.download_stream(key).await
    }

    fn driver(&self) -> StorageDriver {
        self.inner.driver()
    }
}

/// In-memory items whose create and delete can be made to fail.
#[derive(Default)]
pub struct FlakyItems {
    inner: MemoryItems,
    fail_create: AtomicBool,
    fail_delete: AtomicBool,
}

impl FlakyItems {
    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub async fn len(&self, collection: &str) -> usize {
        self.inner.len(collection).await
    }
}

#[async_trait]
impl ItemsService for FlakyItems {
    async fn create_item(&self, collection: &str, item: Item, query: &Query) -> Result<Item, AppError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(AppError::Persistence("connection reset".to_string()));
        }
        self.inner.create_item(collection, item, query).await
    }

    async fn read_items(&self, collection: &str, query: &Query) -> Result<Vec<Item>, AppError> {
        self.inner.read_items(collection, query).await
    }

    async fn read_item(&self, collection: &str, id: Uuid, query: &Query) -> Result<Item, AppError> {
        self.inner.read_item(collection, id, query).await
    }

    async fn update_item(
        &self,
        collection: &str,
        id: Uuid,
        patch: Item,
        query: &Query,
    ) -> Result<Item, AppError> {
        self.inner.update_item(collection, id, patch, query).await
    }

    async fn delete_item(&self, collection: &str, id: Uuid) -> Result<(), AppError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(AppError::Persistence("connection reset".to_string()));
        }
        self.inner.delete_item(collection, id).await
    }
}
