//! Shared constants.

/// Logical record type name used for file records in the persistence collaborator.
pub const FILES_COLLECTION: &str = "vellum_files";

/// Path segment under the public URL where assets are served.
pub const ASSETS_PATH: &str = "assets";

/// Query parameter carrying the asset size key on thumbnail URLs.
pub const ASSET_KEY_PARAM: &str = "key";

/// Fields a file record needs to resolve its links and locate its bytes.
pub const FILE_IDENTITY_FIELDS: [&str; 4] = ["id", "storage", "filename_disk", "filename_download"];
