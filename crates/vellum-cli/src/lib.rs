//! Shared pieces of the `vellum` command line tool.

use std::path::Path;

use anyhow::Context;
use futures::StreamExt;
use serde_json::{json, Value as JsonValue};
use tokio_util::io::ReaderStream;
use vellum_core::{AppError, ErrorMetadata, LogLevel};
use vellum_processing::{HeaderScanner, ImageMetadata, MetadataExtractor, ScanState, UploadStream};

const DEFAULT_MAX_HEADER_BYTES: usize = 4 * 1024 * 1024;

/// Mime type from a file extension; `application/octet-stream` when unknown.
pub fn guess_mime(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        "bmp" => "image/bmp",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "json" => "application/json",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// Open `path` as an upload stream.
pub async fn file_stream(path: &Path) -> anyhow::Result<UploadStream> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(Box::pin(ReaderStream::new(file)))
}

/// Run header scanning and metadata extraction on a local file without storing it.
pub async fn inspect_file(path: &Path, mime_type: &str) -> anyhow::Result<Option<ImageMetadata>> {
    let size_bytes = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .len();

    let mut stream = file_stream(path).await?;
    let mut scanner = HeaderScanner::new(DEFAULT_MAX_HEADER_BYTES);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.with_context(|| format!("Failed to read {}", path.display()))?;
        if scanner.feed(&chunk) == ScanState::Complete {
            break;
        }
    }

    let mut header = scanner.finish();
    header.size_bytes = size_bytes;
    Ok(MetadataExtractor::new().extract(Some(mime_type), header))
}

/// JSON printed when a service operation fails.
///
/// Sensitive errors only show their client message in production.
pub fn error_report(err: &AppError, production: bool) -> JsonValue {
    let message = if production && err.is_sensitive() {
        err.client_message()
    } else {
        err.detailed_message()
    };
    json!({
        "error": {
            "code": err.error_code(),
            "type": err.error_type(),
            "status": err.http_status_code(),
            "message": message,
            "recoverable": err.is_recoverable(),
            "suggested_action": err.suggested_action(),
        }
    })
}

/// Log `err` at the level its metadata asks for.
pub fn log_app_error(err: &AppError) {
    let details = err.detailed_message();
    match err.log_level() {
        LogLevel::Debug => tracing::debug!(error_code = err.error_code(), error = %details, "Command failed"),
        LogLevel::Warn => tracing::warn!(error_code = err.error_code(), error = %details, "Command failed"),
        LogLevel::Error => tracing::error!(error_code = err.error_code(), error = %details, "Command failed"),
    }
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
