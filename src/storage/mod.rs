//! Blob storage layer.
//!
//! The pipeline and record store address images by relative key (e.g.
//! `images/Alumni/pic1.webp`). Three backends implement [`BlobStore`]:
//!
//! - [`LocalBlobStore`]: a media root directory on the local filesystem
//! - [`S3BlobStore`]: a bucket (plus optional prefix) in S3-compatible storage
//! - [`MemoryBlobStore`]: process memory, for tests and development

mod blob_store;
mod local;
mod memory;
mod s3;

pub use blob_store::{
    available_key, available_key_with, sanitize_file_name, validate_key, BlobStore,
};
pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;
pub use s3::{create_s3_client, S3BlobStore};
