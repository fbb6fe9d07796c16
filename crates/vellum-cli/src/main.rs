//! Vellum CLI: inspect local files and ingest them through the configured storage.
//!
//! `upload` reads the same environment as the library (`PUBLIC_URL`,
//! `STORAGE_LOCATIONS`, `STORAGE_<NAME>_*`). `ASSET_ALLOWLIST` may hold a JSON
//! array of extra asset sizes for the printed links.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Map, Value as JsonValue};
use vellum_cli::{error_report, file_stream, guess_mime, init_tracing, inspect_file, log_app_error};
use vellum_core::models::{FileWithLinks, Query};
use vellum_core::{AppError, Config};
use vellum_services::{
    AssetLinkResolver, FileService, IngestionPipeline, Item, MemoryItems, PassthroughPayload,
    StaticSettings, StorageRegistry, UploadStream,
};

#[derive(Parser)]
#[command(name = "vellum", about = "Vellum asset ingestion CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract image metadata from a local file without storing it
    Inspect {
        /// Path to the file
        file: PathBuf,
        /// Mime type (guessed from the extension if omitted)
        #[arg(long)]
        mime: Option<String>,
    },
    /// Store a file and print the resulting record with its links
    Upload {
        /// Path to the file to upload
        file: PathBuf,
        /// Storage location (defaults to the first configured location)
        #[arg(long)]
        storage: Option<String>,
        /// Title for the record
        #[arg(long)]
        title: Option<String>,
        /// Mime type (guessed from the extension if omitted)
        #[arg(long)]
        mime: Option<String>,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

async fn build_service(config: &Config) -> anyhow::Result<FileService> {
    let registry = StorageRegistry::from_config(config)
        .await
        .context("Failed to initialize storage locations")?;
    let pipeline = IngestionPipeline::from_config(registry, config);

    let allowlist = match std::env::var("ASSET_ALLOWLIST") {
        Ok(raw) => serde_json::from_str(&raw).context("ASSET_ALLOWLIST must be a JSON array")?,
        Err(_) => JsonValue::Null,
    };
    let settings = StaticSettings::from_json(allowlist)?;

    Ok(FileService::new(
        Arc::new(MemoryItems::new()),
        Arc::new(PassthroughPayload),
        Arc::new(settings),
        pipeline,
        AssetLinkResolver::new(config.link_config()),
    ))
}

async fn upload(
    service: &FileService,
    data: Item,
    stream: UploadStream,
) -> Result<FileWithLinks, AppError> {
    let record = service.create(data, stream, &Query::default()).await?;
    service.read_one(record.id, &Query::default()).await
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    init_tracing();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { file, mime } => {
            let mime = mime.unwrap_or_else(|| guess_mime(&file).to_string());
            let metadata = inspect_file(&file, &mime).await?;
            print_json(&json!({ "mime_type": mime, "image": metadata }))?;
        }
        Commands::Upload {
            file,
            storage,
            title,
            mime,
        } => {
            let config = Config::from_env().context("Failed to load configuration")?;
            let service = build_service(&config).await?;

            let filename = file
                .file_name()
                .and_then(|name| name.to_str())
                .context("File name must be valid UTF-8")?
                .to_string();
            let mime = mime.unwrap_or_else(|| guess_mime(&file).to_string());

            let mut data = Map::new();
            data.insert("filename_download".to_string(), JsonValue::String(filename));
            data.insert("mime_type".to_string(), JsonValue::String(mime));
            if let Some(storage) = storage {
                data.insert("storage".to_string(), JsonValue::String(storage));
            }
            if let Some(title) = title {
                data.insert("title".to_string(), JsonValue::String(title));
            }

            let stream = file_stream(&file).await?;
            match upload(&service, data, stream).await {
                Ok(with_links) => print_json(&with_links)?,
                Err(err) => {
                    log_app_error(&err);
                    print_json(&error_report(&err, config.is_production()))?;
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
