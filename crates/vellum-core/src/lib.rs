//! Vellum Core Library
//!
//! This crate provides the domain models, error types and configuration shared by
//! every Vellum component: the file record and its embedded metadata, asset size
//! descriptors, the computed link set, and the storage driver identifiers.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{Config, LinkConfig, StorageLocationConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use storage_types::StorageDriver;
// Note: Storage, StorageError, StorageResult live in the vellum-storage crate
