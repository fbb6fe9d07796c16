//! Storage location registry.
//!
//! Every file record names the storage location that holds its bytes. The registry
//! maps those names to backend instances and knows which location new uploads go to.

use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageDriver;
use std::collections::HashMap;
use std::sync::Arc;
use vellum_core::{Config, StorageLocationConfig};

#[derive(Clone)]
pub struct StorageRegistry {
    locations: HashMap<String, Arc<dyn Storage>>,
    default: String,
}

impl StorageRegistry {
    /// Create a registry whose default location is `default`.
    pub fn new(default: impl Into<String>, storage: Arc<dyn Storage>) -> Self {
        let default = default.into();
        let mut locations = HashMap::new();
        locations.insert(default.clone(), storage);
        Self { locations, default }
    }

    /// Add or replace a named location.
    pub fn register(mut self, name: impl Into<String>, storage: Arc<dyn Storage>) -> Self {
        self.locations.insert(name.into(), storage);
        self
    }

    pub fn location(&self, name: &str) -> StorageResult<Arc<dyn Storage>> {
        self.locations
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::UnknownLocation(name.to_string()))
    }

    pub fn default_name(&self) -> &str {
        &self.default
    }

    pub fn default_location(&self) -> StorageResult<Arc<dyn Storage>> {
        self.location(&self.default)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.locations.keys().map(String::as_str)
    }

    /// Build every configured location. The first configured location is the default.
    pub async fn from_config(config: &Config) -> StorageResult<Self> {
        let mut locations = config.storage_locations.iter();
        let first = locations.next().ok_or_else(|| {
            StorageError::ConfigError("No storage locations configured".to_string())
        })?;

        let mut registry = Self::new(first.name.clone(), build_location(first).await?);
        for location in locations {
            registry = registry.register(location.name.clone(), build_location(location).await?);
        }

        tracing::info!(
            default = %registry.default,
            locations = registry.locations.len(),
            "Storage registry initialized"
        );

        Ok(registry)
    }
}

async fn build_location(location: &StorageLocationConfig) -> StorageResult<Arc<dyn Storage>> {
    match location.driver {
        #[cfg(feature = "storage-local")]
        StorageDriver::Local => {
            let root = location.root.clone().ok_or_else(|| {
                StorageError::ConfigError(format!(
                    "Storage location '{}' requires a root directory",
                    location.name
                ))
            })?;
            tracing::debug!(location = %location.name, root = %root, "Building local storage");
            Ok(Arc::new(crate::LocalStorage::new(root).await?))
        }
        #[cfg(feature = "storage-s3")]
        StorageDriver::S3 => {
            let bucket = location.bucket.clone().ok_or_else(|| {
                StorageError::ConfigError(format!(
                    "Storage location '{}' requires a bucket",
                    location.name
                ))
            })?;
            let region = location.region.clone().ok_or_else(|| {
                StorageError::ConfigError(format!(
                    "Storage location '{}' requires a region",
                    location.name
                ))
            })?;
            tracing::debug!(location = %location.name, bucket = %bucket, "Building S3 storage");
            Ok(Arc::new(
                crate::S3Storage::new(
                    bucket,
                    region,
                    location.endpoint.clone(),
                    location.root.clone(),
                )
                .await?,
            ))
        }
        #[allow(unreachable_patterns)]
        other => Err(StorageError::ConfigError(format!(
            "Storage driver '{}' is not enabled in this build",
            other
        ))),
    }
}
