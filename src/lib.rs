//! # STAC Media
//!
//! Content backend for a student astronomy club's website: records for
//! alumni, core team, events, galleries, homepage highlights and
//! notifications, with every uploaded image normalized to WebP.
//!
//! ## Features
//!
//! - **One normalization routine**: every image-bearing entity shares the same
//!   decode, bounding-box downscale (720×1080), WebP q90 encode pipeline
//! - **Orphan cleanup**: superseded uploads are deleted, placeholder images never are
//! - **Contained failures**: a bad upload never fails the record write
//! - **Per-record locking**: concurrent writes to one record are serialized
//! - **Pluggable storage**: local media directory, S3, or memory
//!
//! ## Architecture
//!
//! - [`storage`] - Blob store trait and backends
//! - [`normalize`] - Image normalization pipeline
//! - [`records`] - Entities, tables, write path, snapshots
//! - [`server`] - Axum-based read-only JSON API and media serving
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stac_media::{Alumni, Catalog, ImageNormalizer, LocalBlobStore, RecordWriter, Upload};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(LocalBlobStore::new("media"));
//!     let catalog = Catalog::new();
//!     let writer = RecordWriter::new(ImageNormalizer::new(store));
//!
//!     let alumni: Alumni = serde_json::from_str(
//!         r#"{"name": "Asha", "email": "asha@example.com", "message": "",
//!             "linkedin_url": "", "instagram_url": ""}"#,
//!     )?;
//!     let upload = Upload::new("portrait.png", std::fs::read("portrait.png")?);
//!
//!     let report = writer.create(&catalog.alumni, alumni, Some(upload)).await?;
//!     println!("{}", report.record.record.image);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod normalize;
pub mod records;
pub mod server;
pub mod storage;

// Re-export commonly used types
pub use config::{
    AddConfig, Cli, Command, EntityKind, NormalizeArgs, NormalizeConfig, ServeConfig,
    SetImageConfig, StorageArgs, StorageBackend,
};
pub use error::{NormalizeError, RecordError, StoreError};
pub use normalize::{
    fit_within, is_webp, is_webp_ref, replace_extension_with_webp, EncodedImage, ImageFamily,
    ImageNormalizer, NormalizeOutcome, NormalizePolicy, NormalizeSettings, NormalizedImage,
    SkipReason, WebpTranscoder,
};
pub use records::{
    Achievement, Alumni, Catalog, ClubActivity, Event, EventKind, Fest, ImageRecord, KeyedLocks,
    Member, Notification, Photo, Position, Project, Record, RecordWriter, SaveReport, Stored,
    Table, Upload, Video,
};
pub use server::{create_router, ApiError, AppState, ErrorResponse, HealthResponse, RouterConfig};
pub use storage::{
    available_key, create_s3_client, BlobStore, LocalBlobStore, MemoryBlobStore, S3BlobStore,
};
