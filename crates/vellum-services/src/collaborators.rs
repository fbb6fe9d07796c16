//! Contracts of the external collaborators the file service calls.
//!
//! Record persistence, payload coercion and settings storage are owned by other
//! components; the file service only depends on these narrow traits.

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;
use vellum_core::models::{AssetSize, Query};
use vellum_core::AppError;

/// A record as exchanged with the persistence collaborator.
pub type Item = Map<String, JsonValue>;

/// Which mutation a payload is being prepared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
        }
    }
}

/// Generic record persistence keyed by collection name.
///
/// `read_item`, `update_item` and `delete_item` return [`AppError::NotFound`] for an
/// unknown id. Other failures are reported as [`AppError::Persistence`].
#[async_trait]
pub trait ItemsService: Send + Sync {
    async fn create_item(&self, collection: &str, item: Item, query: &Query) -> Result<Item, AppError>;

    async fn read_items(&self, collection: &str, query: &Query) -> Result<Vec<Item>, AppError>;

    async fn read_item(&self, collection: &str, id: Uuid, query: &Query) -> Result<Item, AppError>;

    async fn update_item(
        &self,
        collection: &str,
        id: Uuid,
        patch: Item,
        query: &Query,
    ) -> Result<Item, AppError>;

    async fn delete_item(&self, collection: &str, id: Uuid) -> Result<(), AppError>;
}

/// Validates and coerces raw input before it reaches the file service.
/// Rejections are [`AppError::InvalidInput`].
#[async_trait]
pub trait PayloadService: Send + Sync {
    async fn process_values(
        &self,
        operation: Operation,
        collection: &str,
        raw: Item,
    ) -> Result<Item, AppError>;
}

/// Read access to the persisted settings record.
#[async_trait]
pub trait SettingsService: Send + Sync {
    /// Administrator-configured derived sizes; empty when none are configured.
    async fn asset_allowlist(&self) -> Result<Vec<AssetSize>, AppError>;
}
