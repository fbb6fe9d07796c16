//! Vellum Storage Library
//!
//! This crate provides the storage abstraction and its implementations: the
//! `Storage` trait, a local filesystem backend, an S3-compatible backend, and the
//! `StorageRegistry` that selects a backend by the storage location name recorded
//! on each file.
//!
//! # Storage key format
//!
//! Keys are the file's disk filename, optionally under the location's root prefix.
//! Keys must not be empty, contain `..` or start with `/`. Validation is centralized
//! in the `keys` module so all backends stay consistent.

pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod registry;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use registry::StorageRegistry;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ByteStream, DeleteOutcome, PutAck, Storage, StorageError, StorageResult};
pub use vellum_core::StorageDriver;
