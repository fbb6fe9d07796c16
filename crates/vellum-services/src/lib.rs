//! Vellum Services Layer
//!
//! This crate is the orchestration layer: the file lifecycle service, the asset
//! link resolver, and the contracts of the collaborators it calls (record
//! persistence, payload processing, settings). In-memory collaborators are
//! provided for the command line tool and for tests.

pub mod collaborators;
pub mod files;
pub mod links;
pub mod memory;

pub use collaborators::{Item, ItemsService, Operation, PayloadService, SettingsService};
pub use files::FileService;
pub use links::AssetLinkResolver;
pub use memory::{MemoryItems, PassthroughPayload, StaticSettings};
pub use vellum_processing::{IngestionPipeline, UploadStream};
pub use vellum_storage::{Storage, StorageError, StorageRegistry, StorageResult};
