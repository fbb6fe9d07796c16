//! Data models for the application
//!
//! This module contains the data structures shared across the crates, organized
//! by concern: the persisted file record, its embedded image metadata, asset size
//! descriptors with the computed link set, and the opaque query object handed to
//! the persistence collaborator.

mod asset;
mod file;
mod metadata;
mod query;

// Re-export all models for convenient imports
pub use asset::*;
pub use file::*;
pub use metadata::*;
pub use query::*;
