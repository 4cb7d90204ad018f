//! STAC media backend.
//!
//! This binary runs the public API server and the record/image maintenance
//! commands.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde_json::Value;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stac_media::{
    config::{AddConfig, Cli, Command, NormalizeConfig, ServeConfig, SetImageConfig},
    create_router, create_s3_client, BlobStore, Catalog, EntityKind, EventKind, ImageNormalizer,
    ImageRecord, LocalBlobStore, MemoryBlobStore, NormalizeArgs, NormalizeOutcome, Record, RecordError,
    RecordWriter, RouterConfig, S3BlobStore, StorageArgs, StorageBackend, Table, Upload,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Normalize(config) => run_normalize(config).await,
        Command::Add(config) => run_add(config).await,
        Command::SetImage(config) => run_set_image(config).await,
    }
}

// =============================================================================
// Shared Setup
// =============================================================================

/// Initialize the tracing/logging subsystem.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "stac_media=debug,tower_http=debug"
    } else {
        "stac_media=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Open the configured blob store.
async fn open_store(args: &StorageArgs) -> Arc<dyn BlobStore> {
    match args.storage {
        StorageBackend::Local => Arc::new(LocalBlobStore::new(args.media_root.clone())),
        StorageBackend::S3 => {
            let client = create_s3_client(args.s3_endpoint.as_deref(), &args.s3_region).await;
            Arc::new(S3BlobStore::new(client, args.bucket(), args.s3_prefix.clone()))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage: uploaded images are lost on exit");
            Arc::new(MemoryBlobStore::new())
        }
    }
}

/// Read an image file into an upload named after the file.
async fn read_upload(path: &Path) -> Result<Upload, String> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    Ok(Upload::new(file_name, data))
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => error!("Failed to format output: {}", e),
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let media_base_url = match config.media_base_url() {
        Ok(url) => url,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let store = open_store(&config.storage).await;

    let catalog = match Catalog::load(&config.data_file).await {
        Ok(catalog) => Arc::new(catalog),
        Err(e) => {
            error!("Failed to load catalog: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Configuration:");
    info!("  Storage: {}", store.identifier());
    info!("  Catalog: {}", config.data_file.display());
    match &media_base_url {
        Some(url) => info!("  Media base URL: {}", url),
        None => info!("  Media base URL: from request Host header"),
    }

    let mut router_config = RouterConfig::new()
        .with_media_base_url(media_base_url)
        .with_cache_max_age(config.cache_max_age)
        .with_tracing(!config.no_tracing);
    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    let router = create_router(catalog, store, router_config);

    let addr = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("Server listening on: http://{}", addr);
    info!("  curl http://{}/health", addr);
    info!("  curl http://{}/api/homepage", addr);

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

// =============================================================================
// Normalize Command
// =============================================================================

async fn run_normalize(config: NormalizeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let (family, settings) = match (config.family(), config.image.settings()) {
        (Ok(family), Ok(settings)) => (family, settings),
        (Err(e), _) | (_, Err(e)) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let store = open_store(&config.storage).await;
    let normalizer = ImageNormalizer::with_settings(store, settings);

    let outcome = normalizer
        .normalize(family, config.previous_ref.as_deref(), &config.current_ref)
        .await;
    print_json(&outcome.to_json());

    match outcome {
        NormalizeOutcome::Failed(_) => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    }
}

// =============================================================================
// Record Commands
// =============================================================================

async fn run_add(config: AddConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let fields: Value = match tokio::fs::read(&config.record)
        .await
        .map_err(|e| e.to_string())
        .and_then(|data| serde_json::from_slice(&data).map_err(|e| e.to_string()))
    {
        Ok(fields) => fields,
        Err(e) => {
            error!("Cannot read record {}: {}", config.record.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let upload = match &config.image {
        Some(path) => match read_upload(path).await {
            Ok(upload) => Some(upload),
            Err(e) => {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    let Some((catalog, writer)) =
        open_catalog(&config.storage, &config.normalize, &config.data_file).await
    else {
        return ExitCode::FAILURE;
    };

    let result = add_record(&catalog, &writer, config.entity, fields, upload).await;
    finish_record_command(result, &catalog, &config.data_file).await
}

async fn run_set_image(config: SetImageConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let upload = match read_upload(&config.image).await {
        Ok(upload) => upload,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let Some((catalog, writer)) =
        open_catalog(&config.storage, &config.normalize, &config.data_file).await
    else {
        return ExitCode::FAILURE;
    };

    let result = set_record_image(&catalog, &writer, config.entity, config.id, upload).await;
    finish_record_command(result, &catalog, &config.data_file).await
}

async fn open_catalog(
    storage: &StorageArgs,
    normalize: &NormalizeArgs,
    data_file: &Path,
) -> Option<(Catalog, RecordWriter<dyn BlobStore>)> {
    let settings = match normalize.settings() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Configuration error: {}", e);
            return None;
        }
    };

    let catalog = match Catalog::load(data_file).await {
        Ok(catalog) => catalog,
        Err(e) => {
            error!("Failed to load catalog: {}", e);
            return None;
        }
    };

    let store = open_store(storage).await;
    let writer = RecordWriter::new(ImageNormalizer::with_settings(store, settings));
    Some((catalog, writer))
}

async fn finish_record_command(
    result: Result<Value, RecordError>,
    catalog: &Catalog,
    data_file: &Path,
) -> ExitCode {
    let output = match result {
        Ok(output) => output,
        Err(e) => {
            error!("Write failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = catalog.persist(data_file).await {
        error!("Failed to save catalog: {}", e);
        return ExitCode::FAILURE;
    }

    print_json(&output);
    ExitCode::SUCCESS
}

fn parse_record<T: Record>(fields: Value) -> Result<T, RecordError> {
    serde_json::from_value(fields).map_err(|e| RecordError::InvalidRecord(e.to_string()))
}

async fn add_image_record<T: ImageRecord>(
    writer: &RecordWriter<dyn BlobStore>,
    table: &Table<T>,
    fields: Value,
    upload: Option<Upload>,
) -> Result<Value, RecordError> {
    let report = writer.create(table, parse_record(fields)?, upload).await?;
    Ok(serde_json::json!({
        "record": report.record,
        "normalization": report.outcome.to_json(),
    }))
}

async fn add_plain_record<T: Record>(table: &Table<T>, fields: Value) -> Result<Value, RecordError> {
    let stored = table.insert(parse_record(fields)?).await?;
    Ok(serde_json::json!({ "record": stored }))
}

async fn add_event(
    catalog: &Catalog,
    writer: &RecordWriter<dyn BlobStore>,
    kind: EventKind,
    mut fields: Value,
    upload: Option<Upload>,
) -> Result<Value, RecordError> {
    if let Value::Object(map) = &mut fields {
        map.insert("kind".to_string(), Value::from(kind.as_str()));
    }
    add_image_record(writer, catalog.events(kind), fields, upload).await
}

async fn add_record(
    catalog: &Catalog,
    writer: &RecordWriter<dyn BlobStore>,
    entity: EntityKind,
    fields: Value,
    upload: Option<Upload>,
) -> Result<Value, RecordError> {
    match entity {
        EntityKind::Alumni => add_image_record(writer, &catalog.alumni, fields, upload).await,
        EntityKind::Coreteam => add_image_record(writer, &catalog.core_team, fields, upload).await,
        EntityKind::Astrax => add_event(catalog, writer, EventKind::Astrax, fields, upload).await,
        EntityKind::Pleiades => add_event(catalog, writer, EventKind::Pleiades, fields, upload).await,
        EntityKind::Zenith => add_event(catalog, writer, EventKind::Zenith, fields, upload).await,
        EntityKind::Utkarsh => add_event(catalog, writer, EventKind::Utkarsh, fields, upload).await,
        EntityKind::Photo => add_image_record(writer, &catalog.photos, fields, upload).await,
        EntityKind::Project => add_image_record(writer, &catalog.projects, fields, upload).await,
        EntityKind::Clubactivity => {
            add_image_record(writer, &catalog.club_activities, fields, upload).await
        }
        EntityKind::Fest => add_image_record(writer, &catalog.fests, fields, upload).await,
        EntityKind::Video => add_plain_record(&catalog.videos, fields).await,
        EntityKind::Achievement => add_plain_record(&catalog.achievements, fields).await,
        EntityKind::Notification => add_plain_record(&catalog.notifications, fields).await,
    }
}

async fn set_image_of<T: ImageRecord>(
    writer: &RecordWriter<dyn BlobStore>,
    table: &Table<T>,
    id: u64,
    upload: Upload,
) -> Result<Value, RecordError> {
    let report = writer.set_image(table, id, upload).await?;
    Ok(serde_json::json!({
        "record": report.record,
        "normalization": report.outcome.to_json(),
    }))
}

async fn set_record_image(
    catalog: &Catalog,
    writer: &RecordWriter<dyn BlobStore>,
    entity: EntityKind,
    id: u64,
    upload: Upload,
) -> Result<Value, RecordError> {
    match entity {
        EntityKind::Alumni => set_image_of(writer, &catalog.alumni, id, upload).await,
        EntityKind::Coreteam => set_image_of(writer, &catalog.core_team, id, upload).await,
        EntityKind::Astrax => set_image_of(writer, &catalog.astrax, id, upload).await,
        EntityKind::Pleiades => set_image_of(writer, &catalog.pleiades, id, upload).await,
        EntityKind::Zenith => set_image_of(writer, &catalog.zenith, id, upload).await,
        EntityKind::Utkarsh => set_image_of(writer, &catalog.utkarsh, id, upload).await,
        EntityKind::Photo => set_image_of(writer, &catalog.photos, id, upload).await,
        EntityKind::Project => set_image_of(writer, &catalog.projects, id, upload).await,
        EntityKind::Clubactivity => set_image_of(writer, &catalog.club_activities, id, upload).await,
        EntityKind::Fest => set_image_of(writer, &catalog.fests, id, upload).await,
        EntityKind::Video | EntityKind::Achievement | EntityKind::Notification => Err(
            RecordError::InvalidRecord(format!("{:?} records have no image", entity)),
        ),
    }
}
