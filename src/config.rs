//! Configuration management for the STAC media backend.
//!
//! This module provides a flexible configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `STAC_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Commands
//!
//! - `serve` - Run the public API server
//! - `normalize` - Run the normalization pipeline on one stored blob
//! - `add` - Create a record from a JSON file, optionally with an image
//! - `set-image` - Replace the image of an existing record
//!
//! # Environment Variables
//!
//! - `STAC_HOST` - Server bind address (default: 0.0.0.0)
//! - `STAC_PORT` - Server port (default: 8000)
//! - `STAC_STORAGE` - Blob backend: local, s3, memory (default: local)
//! - `STAC_MEDIA_ROOT` - Media directory for the local backend (default: media)
//! - `STAC_S3_BUCKET` - S3 bucket (required for the s3 backend)
//! - `STAC_S3_PREFIX` - Key prefix inside the bucket
//! - `STAC_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `STAC_S3_REGION` - AWS region (default: us-east-1)
//! - `STAC_DATA_FILE` - Catalog snapshot file (default: data/catalog.json)
//! - `STAC_MEDIA_BASE_URL` - Absolute base for image URLs in API output
//! - `STAC_MAX_WIDTH` / `STAC_MAX_HEIGHT` - Bounding box (default: 720x1080)
//! - `STAC_WEBP_QUALITY` - WebP quality (default: 90)
//! - `STAC_CACHE_MAX_AGE` - Media cache max-age seconds (default: 3600)
//! - `STAC_CORS_ORIGINS` - Allowed CORS origins, comma-separated

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use url::Url;

use crate::normalize::{
    ImageFamily, NormalizeSettings, DEFAULT_MAX_HEIGHT, DEFAULT_MAX_WIDTH, DEFAULT_WEBP_QUALITY,
};
use crate::records::family_by_name;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8000;

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default media directory for the local backend.
pub const DEFAULT_MEDIA_ROOT: &str = "media";

/// Default catalog snapshot path.
pub const DEFAULT_DATA_FILE: &str = "data/catalog.json";

/// Default HTTP cache max-age for media, in seconds (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

// =============================================================================
// CLI
// =============================================================================

/// STAC media backend - club site records with normalized WebP images.
#[derive(Parser, Debug, Clone)]
#[command(name = "stac-media")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Consume the CLI and return the selected command.
    pub fn into_command(self) -> Command {
        self.command
    }
}

/// Top-level commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the public API server.
    Serve(ServeConfig),

    /// Normalize one stored image and print the outcome as JSON.
    Normalize(NormalizeConfig),

    /// Create a record from a JSON file.
    Add(AddConfig),

    /// Replace the image of an existing record.
    SetImage(SetImageConfig),
}

// =============================================================================
// Shared Argument Groups
// =============================================================================

/// Blob store backend.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Media directory on the local filesystem
    Local,
    /// S3 or an S3-compatible service
    S3,
    /// Process memory (development only; nothing is kept)
    Memory,
}

/// Blob store options.
#[derive(Args, Debug, Clone)]
pub struct StorageArgs {
    /// Blob store backend.
    #[arg(long, value_enum, default_value_t = StorageBackend::Local, env = "STAC_STORAGE")]
    pub storage: StorageBackend,

    /// Media root directory for the local backend.
    #[arg(long, default_value = DEFAULT_MEDIA_ROOT, env = "STAC_MEDIA_ROOT")]
    pub media_root: PathBuf,

    /// S3 bucket holding the media.
    #[arg(long, env = "STAC_S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// Key prefix inside the bucket.
    #[arg(long, env = "STAC_S3_PREFIX")]
    pub s3_prefix: Option<String>,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, env = "STAC_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "STAC_S3_REGION")]
    pub s3_region: String,
}

impl StorageArgs {
    /// Validate backend-specific options.
    pub fn validate(&self) -> Result<(), String> {
        match self.storage {
            StorageBackend::S3 => match self.s3_bucket.as_deref() {
                Some(bucket) if !bucket.is_empty() => Ok(()),
                _ => Err(
                    "S3 bucket name is required for the s3 backend. Set --s3-bucket or STAC_S3_BUCKET"
                        .to_string(),
                ),
            },
            StorageBackend::Local => {
                if self.media_root.as_os_str().is_empty() {
                    return Err("media root must not be empty".to_string());
                }
                Ok(())
            }
            StorageBackend::Memory => Ok(()),
        }
    }

    /// The configured bucket, or an empty string (call validate() first).
    pub fn bucket(&self) -> String {
        self.s3_bucket.clone().unwrap_or_default()
    }
}

/// Image normalization options.
#[derive(Args, Debug, Clone)]
pub struct NormalizeArgs {
    /// Maximum width of normalized images in pixels.
    #[arg(long, default_value_t = DEFAULT_MAX_WIDTH, env = "STAC_MAX_WIDTH")]
    pub max_width: u32,

    /// Maximum height of normalized images in pixels.
    #[arg(long, default_value_t = DEFAULT_MAX_HEIGHT, env = "STAC_MAX_HEIGHT")]
    pub max_height: u32,

    /// WebP quality (1-100).
    #[arg(long, default_value_t = DEFAULT_WEBP_QUALITY, env = "STAC_WEBP_QUALITY")]
    pub webp_quality: u8,
}

impl NormalizeArgs {
    /// Build validated pipeline settings.
    pub fn settings(&self) -> Result<NormalizeSettings, String> {
        NormalizeSettings::new(self.max_width, self.max_height, self.webp_quality)
    }
}

// =============================================================================
// Serve Command
// =============================================================================

/// Options for `serve`.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "STAC_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "STAC_PORT")]
    pub port: u16,

    #[command(flatten)]
    pub storage: StorageArgs,

    /// Catalog snapshot file.
    #[arg(long, default_value = DEFAULT_DATA_FILE, env = "STAC_DATA_FILE")]
    pub data_file: PathBuf,

    /// Absolute base URL for image links (default: derived from the Host header).
    #[arg(long, env = "STAC_MEDIA_BASE_URL")]
    pub media_base_url: Option<String>,

    /// HTTP Cache-Control max-age for media, in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "STAC_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "STAC_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.storage.validate()?;
        self.media_base_url()?;
        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Parse the media base URL, if configured.
    pub fn media_base_url(&self) -> Result<Option<Url>, String> {
        self.media_base_url
            .as_deref()
            .map(|raw| {
                let url =
                    Url::parse(raw).map_err(|e| format!("invalid media base URL '{}': {}", raw, e))?;
                if url.cannot_be_a_base() {
                    return Err(format!("media base URL '{}' cannot be a base", raw));
                }
                Ok(url)
            })
            .transpose()
    }
}

// =============================================================================
// Normalize Command
// =============================================================================

/// Options for `normalize`.
#[derive(Args, Debug, Clone)]
pub struct NormalizeConfig {
    /// Image family (alumni, core_team, astrax, pleiades, zenith, utkarsh,
    /// photo_gallery, projects, club_activity, fests).
    #[arg(long)]
    pub family: String,

    /// Key of the stored upload to normalize.
    pub current_ref: String,

    /// The record's image key before this write, if the image changed.
    #[arg(long)]
    pub previous_ref: Option<String>,

    #[command(flatten)]
    pub storage: StorageArgs,

    #[command(flatten)]
    pub image: NormalizeArgs,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl NormalizeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.storage.validate()?;
        self.image.settings()?;
        self.family()?;
        if self.current_ref.is_empty() {
            return Err("current ref must not be empty".to_string());
        }
        Ok(())
    }

    /// Resolve the image family.
    pub fn family(&self) -> Result<&'static ImageFamily, String> {
        family_by_name(&self.family).ok_or_else(|| format!("unknown image family '{}'", self.family))
    }
}

// =============================================================================
// Record Commands
// =============================================================================

/// Entity kinds addressable from the CLI.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Alumni,
    Coreteam,
    Astrax,
    Pleiades,
    Zenith,
    Utkarsh,
    Photo,
    Video,
    Project,
    Clubactivity,
    Achievement,
    Fest,
    Notification,
}

impl EntityKind {
    /// Returns true if records of this kind carry an image.
    pub fn has_image(&self) -> bool {
        !matches!(
            self,
            EntityKind::Video | EntityKind::Achievement | EntityKind::Notification
        )
    }
}

/// Options for `add`.
#[derive(Args, Debug, Clone)]
pub struct AddConfig {
    /// Kind of record to create.
    #[arg(value_enum)]
    pub entity: EntityKind,

    /// JSON file with the record fields.
    pub record: PathBuf,

    /// Image file to upload with the record.
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Catalog snapshot file.
    #[arg(long, default_value = DEFAULT_DATA_FILE, env = "STAC_DATA_FILE")]
    pub data_file: PathBuf,

    #[command(flatten)]
    pub storage: StorageArgs,

    #[command(flatten)]
    pub normalize: NormalizeArgs,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl AddConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.storage.validate()?;
        self.normalize.settings()?;
        if self.image.is_some() && !self.entity.has_image() {
            return Err(format!("{:?} records have no image", self.entity));
        }
        Ok(())
    }
}

/// Options for `set-image`.
#[derive(Args, Debug, Clone)]
pub struct SetImageConfig {
    /// Kind of record to update.
    #[arg(value_enum)]
    pub entity: EntityKind,

    /// Record id.
    pub id: u64,

    /// Image file to upload.
    pub image: PathBuf,

    /// Catalog snapshot file.
    #[arg(long, default_value = DEFAULT_DATA_FILE, env = "STAC_DATA_FILE")]
    pub data_file: PathBuf,

    #[command(flatten)]
    pub storage: StorageArgs,

    #[command(flatten)]
    pub normalize: NormalizeArgs,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl SetImageConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.storage.validate()?;
        self.normalize.settings()?;
        if !self.entity.has_image() {
            return Err(format!("{:?} records have no image", self.entity));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
