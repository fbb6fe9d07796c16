//! Configuration module
//!
//! This module provides the configuration for storage locations, public URLs and
//! ingestion tuning. Everything is read once from the environment (optionally via a
//! `.env` file) and then passed explicitly to the components that need it.

use std::collections::HashMap;
use std::env;

use crate::storage_types::StorageDriver;

// Common constants
const PUBLIC_URL: &str = "/";
const STORAGE_LOCATIONS: &str = "local";
const INGEST_CHANNEL_CAPACITY: usize = 16;
const INGEST_MAX_HEADER_BYTES: usize = 4 * 1024 * 1024;

/// Environment variable prefix for a storage location, e.g. `STORAGE_LOCAL`.
fn env_prefix(location: &str) -> String {
    format!("STORAGE_{}", location.to_uppercase().replace('-', "_"))
}

/// One named storage location (the backend identifier stored on each file).
#[derive(Clone, Debug, PartialEq)]
pub struct StorageLocationConfig {
    pub name: String,
    pub driver: StorageDriver,
    /// Root directory for `local`, key prefix for `s3`.
    pub root: Option<String>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub public_url: Option<String>,
}

/// Public URL configuration handed to the asset link resolver at construction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinkConfig {
    pub public_url: String,
    pub backend_public_urls: HashMap<String, String>,
}

impl LinkConfig {
    pub fn new(public_url: impl Into<String>) -> Self {
        Self {
            public_url: public_url.into(),
            backend_public_urls: HashMap::new(),
        }
    }

    pub fn with_backend_url(mut self, backend: impl Into<String>, url: impl Into<String>) -> Self {
        self.backend_public_urls.insert(backend.into(), url.into());
        self
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    pub public_url: String,
    /// Configured locations; the first one is the default.
    pub storage_locations: Vec<StorageLocationConfig>,
    /// Chunks buffered per branch of the ingestion tee.
    pub ingest_channel_capacity: usize,
    /// Bytes the metadata branch may hold while looking for image headers.
    pub ingest_max_header_bytes: usize,
}

impl Config {
    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let environment = self.environment.to_lowercase();
        environment == "production" || environment == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let environment = var("ENVIRONMENT")
            .or_else(|| var("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let location_names: Vec<String> = var("STORAGE_LOCATIONS")
            .unwrap_or_else(|| STORAGE_LOCATIONS.to_string())
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        let mut storage_locations = Vec::with_capacity(location_names.len());
        for name in location_names {
            let prefix = env_prefix(&name);
            let driver = match var(&format!("{}_DRIVER", prefix)) {
                Some(driver) => driver.parse()?,
                None => StorageDriver::Local,
            };
            storage_locations.push(StorageLocationConfig {
                driver,
                root: var(&format!("{}_ROOT", prefix)),
                bucket: var(&format!("{}_BUCKET", prefix)),
                region: var(&format!("{}_REGION", prefix)).or_else(|| var("AWS_REGION")),
                endpoint: var(&format!("{}_ENDPOINT", prefix)),
                public_url: var(&format!("{}_PUBLIC_URL", prefix)),
                name,
            });
        }

        let config = Config {
            environment,
            public_url: var("PUBLIC_URL").unwrap_or_else(|| PUBLIC_URL.to_string()),
            storage_locations,
            ingest_channel_capacity: var("INGEST_CHANNEL_CAPACITY")
                .and_then(|s| s.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(INGEST_CHANNEL_CAPACITY),
            ingest_max_header_bytes: var("INGEST_MAX_HEADER_BYTES")
                .and_then(|s| s.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(INGEST_MAX_HEADER_BYTES),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.storage_locations.is_empty() {
            return Err(anyhow::anyhow!(
                "STORAGE_LOCATIONS must name at least one storage location"
            ));
        }

        for location in &self.storage_locations {
            let prefix = env_prefix(&location.name);
            match location.driver {
                StorageDriver::Local => {
                    if location.root.is_none() {
                        return Err(anyhow::anyhow!(
                            "{}_ROOT must be set when using the local driver",
                            prefix
                        ));
                    }
                }
                StorageDriver::S3 => {
                    if location.bucket.is_none() {
                        return Err(anyhow::anyhow!(
                            "{}_BUCKET must be set when using the s3 driver",
                            prefix
                        ));
                    }
                    if location.region.is_none() {
                        return Err(anyhow::anyhow!(
                            "{}_REGION or AWS_REGION must be set when using the s3 driver",
                            prefix
                        ));
                    }
                }
            }
        }

        Ok(())
    }

    /// Name of the default storage location.
    pub fn default_storage(&self) -> Option<&str> {
        self.storage_locations.first().map(|l| l.name.as_str())
    }

    pub fn storage_location(&self, name: &str) -> Option<&StorageLocationConfig> {
        self.storage_locations.iter().find(|l| l.name == name)
    }

    pub fn link_config(&self) -> LinkConfig {
        LinkConfig {
            public_url: self.public_url.clone(),
            backend_public_urls: self
                .storage_locations
                .iter()
                .filter_map(|l| l.public_url.clone().map(|url| (l.name.clone(), url)))
                .collect(),
        }
    }
}
