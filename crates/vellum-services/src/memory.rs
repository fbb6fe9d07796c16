//! In-memory collaborators.
//!
//! Process-local implementations of the collaborator traits, used by the command
//! line tool and the test suites. They support the subset of the query contract
//! the file service relies on: field selection, `_eq` filters, sorting and paging.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;
use uuid::Uuid;
use vellum_core::models::{AssetSize, Query};
use vellum_core::AppError;

use crate::collaborators::{Item, ItemsService, Operation, PayloadService, SettingsService};

/// Items keyed by collection, then by id.
#[derive(Debug, Default)]
pub struct MemoryItems {
    collections: RwLock<HashMap<String, BTreeMap<Uuid, Item>>>,
}

impl MemoryItems {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items stored in `collection`.
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }
}

fn item_id(item: &Item) -> Result<Uuid, AppError> {
    let id = item
        .get("id")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| AppError::InvalidInput("Item is missing a string id".to_string()))?;
    Ok(Uuid::parse_str(id)?)
}

fn not_found(collection: &str, id: Uuid) -> AppError {
    AppError::NotFound(format!("Item {} not found in {}", id, collection))
}

fn project(item: &Item, query: &Query) -> Item {
    match &query.fields {
        Some(fields) if !fields.iter().any(|f| f == "*") => item
            .iter()
            .filter(|(key, _)| fields.iter().any(|f| f == *key))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        _ => item.clone(),
    }
}

/// `{ "field": { "_eq": value } }`; conditions on several fields must all hold.
fn matches_filter(item: &Item, filter: Option<&JsonValue>) -> bool {
    let Some(JsonValue::Object(conditions)) = filter else {
        return true;
    };
    conditions.iter().all(|(field, condition)| {
        let actual = item.get(field).unwrap_or(&JsonValue::Null);
        match condition.get("_eq") {
            Some(expected) => actual == expected,
            None => true,
        }
    })
}

fn compare_values(a: Option<&JsonValue>, b: Option<&JsonValue>) -> Ordering {
    match (a, b) {
        (Some(JsonValue::Number(a)), Some(JsonValue::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(JsonValue::String(a)), Some(JsonValue::String(b))) => a.cmp(b),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn sort_items(items: &mut [Item], sort: &[String]) {
    items.sort_by(|a, b| {
        for key in sort {
            let (field, descending) = match key.strip_prefix('-') {
                Some(field) => (field, true),
                None => (key.as_str(), false),
            };
            let ordering = compare_values(a.get(field), b.get(field));
            let ordering = if descending { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

#[async_trait]
impl ItemsService for MemoryItems {
    async fn create_item(&self, collection: &str, item: Item, query: &Query) -> Result<Item, AppError> {
        let id = item_id(&item)?;
        let mut collections = self.collections.write().await;
        let items = collections.entry(collection.to_string()).or_default();
        if items.contains_key(&id) {
            return Err(AppError::InvalidInput(format!(
                "Item {} already exists in {}",
                id, collection
            )));
        }
        let projected = project(&item, query);
        items.insert(id, item);
        Ok(projected)
    }

    async fn read_items(&self, collection: &str, query: &Query) -> Result<Vec<Item>, AppError> {
        let collections = self.collections.read().await;
        let mut items: Vec<Item> = collections
            .get(collection)
            .map(|items| {
                items
                    .values()
                    .filter(|item| matches_filter(item, query.filter.as_ref()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(sort) = &query.sort {
            sort_items(&mut items, sort);
        }

        Ok(items
            .iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|item| project(item, query))
            .collect())
    }

    async fn read_item(&self, collection: &str, id: Uuid, query: &Query) -> Result<Item, AppError> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .and_then(|items| items.get(&id))
            .map(|item| project(item, query))
            .ok_or_else(|| not_found(collection, id))
    }

    async fn update_item(
        &self,
        collection: &str,
        id: Uuid,
        patch: Item,
        query: &Query,
    ) -> Result<Item, AppError> {
        let mut collections = self.collections.write().await;
        let item = collections
            .get_mut(collection)
            .and_then(|items| items.get_mut(&id))
            .ok_or_else(|| not_found(collection, id))?;
        for (key, value) in patch {
            item.insert(key, value);
        }
        Ok(project(item, query))
    }

    async fn delete_item(&self, collection: &str, id: Uuid) -> Result<(), AppError> {
        let mut collections = self.collections.write().await;
        collections
            .get_mut(collection)
            .and_then(|items| items.remove(&id))
            .map(|_| ())
            .ok_or_else(|| not_found(collection, id))
    }
}

/// Fields that must be strings (or null) when present.
const STRING_FIELDS: [&str; 6] = [
    "storage",
    "filename_disk",
    "filename_download",
    "title",
    "description",
    "mime_type",
];

/// Payload processing without coercion: type-checks the known string fields and
/// passes everything through.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughPayload;

#[async_trait]
impl PayloadService for PassthroughPayload {
    async fn process_values(
        &self,
        operation: Operation,
        collection: &str,
        raw: Item,
    ) -> Result<Item, AppError> {
        for field in STRING_FIELDS {
            match raw.get(field) {
                None | Some(JsonValue::Null) | Some(JsonValue::String(_)) => {}
                Some(other) => {
                    return Err(AppError::InvalidInput(format!(
                        "Field '{}' of {} must be a string on {}, got {}",
                        field,
                        collection,
                        operation.as_str(),
                        other
                    )));
                }
            }
        }
        Ok(raw)
    }
}

/// Settings record held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings {
    asset_allowlist: Vec<AssetSize>,
}

impl StaticSettings {
    pub fn new(asset_allowlist: Vec<AssetSize>) -> Self {
        Self { asset_allowlist }
    }

    /// Read the allow-list from its stored JSON form; `null` means none configured.
    pub fn from_json(value: JsonValue) -> Result<Self, AppError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(Self::new(serde_json::from_value(value)?))
    }
}

#[async_trait]
impl SettingsService for StaticSettings {
    async fn asset_allowlist(&self) -> Result<Vec<AssetSize>, AppError> {
        Ok(self.asset_allowlist.clone())
    }
}
