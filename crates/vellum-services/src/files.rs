//! File lifecycle service.
//!
//! Orchestrates create, read, update and delete of file records. Bytes go through
//! the [`IngestionPipeline`] and the storage registry; records go through the
//! persistence collaborator under [`FILES_COLLECTION`]. A record is only persisted
//! after the ingest (storage write and metadata extraction) has fully settled.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;
use uuid::Uuid;
use vellum_core::constants::{FILES_COLLECTION, FILE_IDENTITY_FIELDS};
use vellum_core::models::{FileRecord, FileWithLinks, Query};
use vellum_core::AppError;
use vellum_processing::{is_image_mime, ImageMetadata, IngestionPipeline, UploadStream};
use vellum_storage::{DeleteOutcome, StorageError};

use crate::collaborators::{Item, ItemsService, Operation, PayloadService, SettingsService};
use crate::links::AssetLinkResolver;

/// Fields computed from the stored bytes. Callers never set them directly on create.
const DERIVED_FIELDS: [&str; 4] = ["width", "height", "filesize_bytes", "metadata"];

#[derive(Clone)]
pub struct FileService {
    items: Arc<dyn ItemsService>,
    payload: Arc<dyn PayloadService>,
    settings: Arc<dyn SettingsService>,
    pipeline: IngestionPipeline,
    links: AssetLinkResolver,
}

impl FileService {
    pub fn new(
        items: Arc<dyn ItemsService>,
        payload: Arc<dyn PayloadService>,
        settings: Arc<dyn SettingsService>,
        pipeline: IngestionPipeline,
        links: AssetLinkResolver,
    ) -> Self {
        Self {
            items,
            payload,
            settings,
            pipeline,
            links,
        }
    }

    pub fn links(&self) -> &AssetLinkResolver {
        &self.links
    }

    /// Store an upload and persist its record.
    ///
    /// `data` must carry `filename_download`; `storage` defaults to the registry's
    /// default location. The id is always generated here and `filename_disk`
    /// becomes `{id}{extension}`, the extension taken from a supplied
    /// `filename_disk` or else from `filename_download`.
    ///
    /// Fails without persisting anything if the storage write fails. A failed
    /// extraction only leaves the image-derived fields out.
    pub async fn create(
        &self,
        data: Item,
        stream: UploadStream,
        query: &Query,
    ) -> Result<FileRecord, AppError> {
        let mut payload = self
            .payload
            .process_values(Operation::Create, FILES_COLLECTION, data)
            .await?;

        let filename_download = string_field(&payload, "filename_download")
            .ok_or_else(|| AppError::InvalidInput("filename_download is required".to_string()))?
            .to_string();
        let storage = string_field(&payload, "storage")
            .unwrap_or_else(|| self.pipeline.registry().default_name())
            .to_string();
        let mime_type = string_field(&payload, "mime_type").map(str::to_string);

        let id = Uuid::new_v4();
        let extension = string_field(&payload, "filename_disk")
            .and_then(extension_of)
            .or_else(|| extension_of(&filename_download))
            .unwrap_or_default();
        let filename_disk = format!("{}{}", id, extension);

        let outcome = self
            .pipeline
            .ingest(stream, &storage, &filename_disk, mime_type.as_deref())
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    storage = %storage,
                    key = %filename_disk,
                    "Failed to store upload"
                );
                e
            })?;

        for field in DERIVED_FIELDS {
            payload.remove(field);
        }
        payload.insert("id".to_string(), JsonValue::String(id.to_string()));
        payload.insert("storage".to_string(), JsonValue::String(storage.clone()));
        payload.insert("filename_disk".to_string(), JsonValue::String(filename_disk.clone()));
        payload.insert("filename_download".to_string(), JsonValue::String(filename_download));
        payload.insert("uploaded_on".to_string(), JsonValue::String(Utc::now().to_rfc3339()));

        if is_image_mime(mime_type.as_deref()) {
            payload.insert(
                "filesize_bytes".to_string(),
                JsonValue::from(outcome.bytes_written()),
            );
        }
        if let Some(metadata) = &outcome.metadata {
            merge_metadata(&mut payload, metadata)?;
        }

        let created = match self
            .items
            .create_item(FILES_COLLECTION, payload, &query.ensure_fields(&FILE_IDENTITY_FIELDS))
            .await
        {
            Ok(created) => created,
            Err(e) => {
                tracing::error!(error = %e, file_id = %id, "Failed to persist file record");
                self.remove_orphan(&storage, &filename_disk).await;
                return Err(e);
            }
        };

        tracing::info!(
            file_id = %id,
            storage = %storage,
            key = %filename_disk,
            size_bytes = outcome.bytes_written(),
            has_metadata = outcome.metadata.is_some(),
            "File created"
        );

        to_record(created)
    }

    /// Listing and filtering are the persistence collaborator's; links are not attached.
    pub async fn read_many(&self, query: &Query) -> Result<Vec<Item>, AppError> {
        self.items.read_items(FILES_COLLECTION, query).await
    }

    pub async fn read_one(&self, id: Uuid, query: &Query) -> Result<FileWithLinks, AppError> {
        let item = self
            .items
            .read_item(FILES_COLLECTION, id, &query.ensure_fields(&FILE_IDENTITY_FIELDS))
            .await?;
        let file = to_record(item)?;

        let configured = self.settings.asset_allowlist().await?;
        let sizes = self.links.allowed_sizes(configured);
        let links = self.links.resolve(&file, &sizes);

        Ok(FileWithLinks { file, links })
    }

    /// Update record fields and optionally replace the stored bytes.
    ///
    /// New bytes overwrite the existing `filename_disk` in the existing storage
    /// location. Metadata is not re-extracted; `filesize_bytes` is refreshed only
    /// if the record already carried one.
    pub async fn update(
        &self,
        id: Uuid,
        data: Item,
        stream: Option<UploadStream>,
        query: &Query,
    ) -> Result<FileRecord, AppError> {
        let mut payload = self
            .payload
            .process_values(Operation::Update, FILES_COLLECTION, data)
            .await?;

        let existing = to_record(
            self.items
                .read_item(FILES_COLLECTION, id, &Query::default())
                .await?,
        )?;
        strip_identity_changes(&mut payload, &existing)?;

        if let Some(stream) = stream {
            let ack = self
                .pipeline
                .replace(stream, &existing.storage, &existing.filename_disk)
                .await
                .map_err(|e| {
                    tracing::error!(
                        error = %e,
                        file_id = %id,
                        storage = %existing.storage,
                        key = %existing.filename_disk,
                        "Failed to replace stored file"
                    );
                    e
                })?;
            if existing.filesize_bytes.is_some() {
                payload.insert("filesize_bytes".to_string(), JsonValue::from(ack.bytes_written));
            }
        }

        payload.insert("modified_on".to_string(), JsonValue::String(Utc::now().to_rfc3339()));

        let updated = self
            .items
            .update_item(
                FILES_COLLECTION,
                id,
                payload,
                &query.ensure_fields(&FILE_IDENTITY_FIELDS),
            )
            .await?;

        tracing::info!(file_id = %id, "File updated");
        to_record(updated)
    }

    /// Remove the stored bytes, then the record.
    ///
    /// An object that is already absent counts as removed. Any other storage
    /// failure keeps the record so the bytes stay addressable.
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let file = to_record(
            self.items
                .read_item(
                    FILES_COLLECTION,
                    id,
                    &Query::with_fields(FILE_IDENTITY_FIELDS),
                )
                .await?,
        )?;
        let backend = self.pipeline.registry().location(&file.storage)?;

        let removed = match backend.delete(&file.filename_disk).await {
            Ok(DeleteOutcome { deleted }) => deleted,
            Err(StorageError::NotFound(_)) => false,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    file_id = %id,
                    storage = %file.storage,
                    key = %file.filename_disk,
                    "Storage delete failed, record kept"
                );
                return Err(e.into());
            }
        };
        if !removed {
            tracing::debug!(
                file_id = %id,
                key = %file.filename_disk,
                "Stored object already absent"
            );
        }

        if let Err(e) = self.items.delete_item(FILES_COLLECTION, id).await {
            tracing::error!(
                error = %e,
                file_id = %id,
                storage = %file.storage,
                key = %file.filename_disk,
                "Storage object removed but record deletion failed"
            );
            return Err(e);
        }

        tracing::info!(file_id = %id, storage = %file.storage, "File deleted");
        Ok(())
    }

    async fn remove_orphan(&self, storage: &str, filename_disk: &str) {
        let result = match self.pipeline.registry().location(storage) {
            Ok(backend) => backend.delete(filename_disk).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(
                error = %e,
                storage = %storage,
                key = %filename_disk,
                "Failed to remove stored object after persistence failure"
            );
        }
    }
}

fn string_field<'a>(item: &'a Item, field: &str) -> Option<&'a str> {
    item.get(field)
        .and_then(JsonValue::as_str)
        .filter(|s| !s.is_empty())
}

/// Extension including its dot, e.g. `.jpg`.
fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext))
}

fn is_blank(item: &Item, field: &str) -> bool {
    match item.get(field) {
        None | Some(JsonValue::Null) => true,
        Some(JsonValue::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn merge_metadata(payload: &mut Item, metadata: &ImageMetadata) -> Result<(), AppError> {
    payload.insert("width".to_string(), JsonValue::from(metadata.width));
    payload.insert("height".to_string(), JsonValue::from(metadata.height));
    payload.insert(
        "filesize_bytes".to_string(),
        JsonValue::from(metadata.filesize_bytes),
    );
    let blocks = serde_json::to_value(&metadata.metadata)
        .map_err(|e| AppError::Internal(format!("Failed to serialize image metadata: {}", e)))?;
    payload.insert("metadata".to_string(), blocks);

    if let Some(headline) = metadata.headline() {
        if is_blank(payload, "title") {
            payload.insert("title".to_string(), JsonValue::String(headline.to_string()));
        }
    }
    if let Some(caption) = metadata.caption() {
        if is_blank(payload, "description") {
            payload.insert("description".to_string(), JsonValue::String(caption.to_string()));
        }
    }
    Ok(())
}

/// Identity fields may be repeated unchanged but never altered.
fn strip_identity_changes(payload: &mut Item, existing: &FileRecord) -> Result<(), AppError> {
    let current = [
        ("id", existing.id.to_string()),
        ("storage", existing.storage.clone()),
        ("filename_disk", existing.filename_disk.clone()),
        ("filename_download", existing.filename_download.clone()),
    ];
    for (field, value) in current {
        let Some(requested) = payload.get(field) else {
            continue;
        };
        if requested.as_str() == Some(value.as_str()) {
            payload.remove(field);
        } else {
            return Err(AppError::InvalidInput(format!(
                "{} cannot be changed after a file is created",
                field
            )));
        }
    }
    Ok(())
}

fn to_record(item: Item) -> Result<FileRecord, AppError> {
    FileRecord::from_item(item)
        .map_err(|e| AppError::Persistence(format!("Malformed file record: {}", e)))
}
