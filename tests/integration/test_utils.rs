//! Test utilities for integration tests.
//!
//! Image builders and store wrappers used across the suites.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, Rgb, RgbImage};

use stac_media::{BlobStore, MemoryBlobStore, StoreError};

// =============================================================================
// Image Builders
// =============================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    })
}

/// Encode a gradient as PNG.
pub fn create_png(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    gradient(width, height)
        .write_to(&mut buf, ImageFormat::Png)
        .expect("Failed to encode PNG");
    buf.into_inner()
}

/// Encode a gradient as JPEG.
pub fn create_jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, 85);
    encoder
        .encode_image(&gradient(width, height))
        .expect("Failed to encode JPEG");
    buf
}

/// Decode an image and return its dimensions.
pub fn decoded_dimensions(data: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(data).expect("Failed to decode image");
    (img.width(), img.height())
}

// =============================================================================
// Store Wrappers
// =============================================================================

/// A memory store whose deletes always fail, counting attempts.
pub struct StickyStore {
    inner: MemoryBlobStore,
    delete_attempts: Arc<AtomicUsize>,
}

impl StickyStore {
    pub fn new(inner: MemoryBlobStore) -> Self {
        Self {
            inner,
            delete_attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn delete_attempts(&self) -> usize {
        self.delete_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for StickyStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError> {
        self.inner.put(key, data).await
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        self.inner.get(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.exists(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.delete_attempts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Connection(format!("delete refused for {}", key)))
    }

    fn identifier(&self) -> &str {
        "sticky://test"
    }
}
