//! Normalization pipeline tests against a real media directory.
//!
//! Tests verify:
//! - Bounding-box downscale and WebP output on disk
//! - Renaming and cleanup of the raw upload and the previous image
//! - Sentinel handling (`default.jpg` becomes `default.webp`, never deleted)
//! - Idempotence and failure containment

use std::sync::Arc;

use stac_media::records::{ALUMNI, PHOTO_GALLERY};
use stac_media::{
    is_webp, BlobStore, ImageNormalizer, LocalBlobStore, MemoryBlobStore, NormalizeError,
    NormalizeOutcome, SkipReason,
};
use tempfile::TempDir;

use super::test_utils::{create_jpeg, create_png, decoded_dimensions, StickyStore};

fn media_dir() -> (TempDir, Arc<LocalBlobStore>) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(LocalBlobStore::new(dir.path()));
    (dir, store)
}

// =============================================================================
// Resize and Rename
// =============================================================================

#[tokio::test]
async fn test_large_png_is_downscaled_and_renamed() {
    let (dir, store) = media_dir();
    store
        .put("images/Alumni/pic1.png", create_png(2000, 3000).into())
        .await
        .unwrap();

    let normalizer = ImageNormalizer::new(Arc::clone(&store));
    let outcome = normalizer
        .normalize(&ALUMNI, None, "images/Alumni/pic1.png")
        .await;

    let image = outcome.normalized().expect("Expected a derivative");
    assert_eq!(image.new_ref, "images/Alumni/pic1.webp");
    assert!(image.changed);
    assert_eq!(image.to_delete, vec!["images/Alumni/pic1.png".to_string()]);
    assert!(image.failed_deletes.is_empty());
    assert_eq!((image.width, image.height), (720, 1080));

    // The raw upload is gone, the derivative is on disk
    assert!(!dir.path().join("images/Alumni/pic1.png").exists());
    let written = std::fs::read(dir.path().join("images/Alumni/pic1.webp")).unwrap();
    assert!(is_webp(&written));
    assert_eq!(written.len(), image.bytes_written);
    assert_eq!(decoded_dimensions(&written), (720, 1080));
}

#[tokio::test]
async fn test_small_image_is_not_upscaled() {
    let (_dir, store) = media_dir();
    store
        .put("images/photogallery/moon.jpg", create_jpeg(100, 50).into())
        .await
        .unwrap();

    let normalizer = ImageNormalizer::new(Arc::clone(&store));
    let outcome = normalizer
        .normalize(&PHOTO_GALLERY, None, "images/photogallery/moon.jpg")
        .await;

    let image = outcome.normalized().unwrap();
    assert_eq!((image.width, image.height), (100, 50));

    let written = store.get("images/photogallery/moon.webp").await.unwrap();
    assert_eq!(decoded_dimensions(&written), (100, 50));
}

#[tokio::test]
async fn test_wide_image_keeps_aspect_ratio() {
    let (_dir, store) = media_dir();
    store
        .put("images/photogallery/sky.png", create_png(1440, 300).into())
        .await
        .unwrap();

    let outcome = ImageNormalizer::new(Arc::clone(&store))
        .normalize(&PHOTO_GALLERY, None, "images/photogallery/sky.png")
        .await;

    let image = outcome.normalized().unwrap();
    assert_eq!((image.width, image.height), (720, 150));
}

// =============================================================================
// Orphan Cleanup
// =============================================================================

#[tokio::test]
async fn test_replacing_image_deletes_upload_and_previous() {
    let (dir, store) = media_dir();
    store
        .put("images/Alumni/old.webp", create_png(10, 10).into())
        .await
        .unwrap();
    store
        .put("images/Alumni/new.jpg", create_jpeg(64, 64).into())
        .await
        .unwrap();

    let outcome = ImageNormalizer::new(Arc::clone(&store))
        .normalize(&ALUMNI, Some("images/Alumni/old.webp"), "images/Alumni/new.jpg")
        .await;

    let image = outcome.normalized().unwrap();
    assert_eq!(image.new_ref, "images/Alumni/new.webp");
    assert_eq!(
        image.to_delete,
        vec![
            "images/Alumni/new.jpg".to_string(),
            "images/Alumni/old.webp".to_string()
        ]
    );

    let mut remaining: Vec<_> = std::fs::read_dir(dir.path().join("images/Alumni"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    remaining.sort();
    assert_eq!(remaining, vec!["new.webp".to_string()]);
}

#[tokio::test]
async fn test_reupload_with_same_name_keeps_derivative() {
    let store = Arc::new(
        MemoryBlobStore::new()
            .with_blob("images/Alumni/pic1.webp", create_png(8, 8))
            .with_blob("images/Alumni/pic1.png", create_png(32, 32)),
    );

    let outcome = ImageNormalizer::new(Arc::clone(&store))
        .normalize(
            &ALUMNI,
            Some("images/Alumni/pic1.webp"),
            "images/Alumni/pic1.png",
        )
        .await;

    // The previous image is the new derivative's key: overwritten, not deleted
    let image = outcome.normalized().unwrap();
    assert_eq!(image.to_delete, vec!["images/Alumni/pic1.png".to_string()]);
    assert_eq!(store.keys().await, vec!["images/Alumni/pic1.webp".to_string()]);
    let written = store.get("images/Alumni/pic1.webp").await.unwrap();
    assert_eq!(decoded_dimensions(&written), (32, 32));
}

#[tokio::test]
async fn test_missing_previous_is_not_scheduled() {
    let store = Arc::new(MemoryBlobStore::new().with_blob("images/Alumni/b.png", create_png(4, 4)));

    let outcome = ImageNormalizer::new(Arc::clone(&store))
        .normalize(&ALUMNI, Some("images/Alumni/gone.webp"), "images/Alumni/b.png")
        .await;

    assert_eq!(outcome.to_delete(), &["images/Alumni/b.png".to_string()]);
}

#[tokio::test]
async fn test_failed_deletes_are_reported_not_fatal() {
    let inner = MemoryBlobStore::new()
        .with_blob("images/Alumni/old.webp", create_png(4, 4))
        .with_blob("images/Alumni/new.png", create_png(4, 4));
    let store = Arc::new(StickyStore::new(inner));

    let outcome = ImageNormalizer::new(Arc::clone(&store))
        .normalize(&ALUMNI, Some("images/Alumni/old.webp"), "images/Alumni/new.png")
        .await;

    let image = outcome.normalized().expect("Deletion failures must not fail the run");
    assert_eq!(image.new_ref, "images/Alumni/new.webp");
    assert_eq!(image.failed_deletes, image.to_delete);
    assert_eq!(store.delete_attempts(), 2);
    assert!(store.exists("images/Alumni/new.webp").await.unwrap());
}

// =============================================================================
// Sentinels
// =============================================================================

#[tokio::test]
async fn test_default_jpg_becomes_default_webp() {
    let (dir, store) = media_dir();
    store
        .put("default.jpg", create_jpeg(40, 40).into())
        .await
        .unwrap();

    let outcome = ImageNormalizer::new(Arc::clone(&store))
        .normalize(&PHOTO_GALLERY, None, "default.jpg")
        .await;

    let image = outcome.normalized().unwrap();
    assert_eq!(image.new_ref, "default.webp");
    assert!(image.changed);
    assert!(image.to_delete.is_empty());

    // The placeholder itself is kept alongside its WebP form
    assert!(dir.path().join("default.jpg").exists());
    assert!(dir.path().join("default.webp").exists());
}

#[tokio::test]
async fn test_sentinel_previous_is_never_deleted() {
    let (dir, store) = media_dir();
    store
        .put("default.webp", create_png(4, 4).into())
        .await
        .unwrap();
    store
        .put("images/Alumni/face.png", create_png(16, 16).into())
        .await
        .unwrap();

    let outcome = ImageNormalizer::new(Arc::clone(&store))
        .normalize(&ALUMNI, Some("default.webp"), "images/Alumni/face.png")
        .await;

    assert_eq!(outcome.to_delete(), &["images/Alumni/face.png".to_string()]);
    assert!(dir.path().join("default.webp").exists());
}

// =============================================================================
// Guards and Failures
// =============================================================================

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let (_dir, store) = media_dir();
    store
        .put("images/Alumni/pic1.png", create_png(30, 30).into())
        .await
        .unwrap();

    let normalizer = ImageNormalizer::new(Arc::clone(&store));
    let first = normalizer
        .normalize(&ALUMNI, None, "images/Alumni/pic1.png")
        .await;
    let new_ref = first.changed_ref().unwrap().to_string();
    let before = store.get(&new_ref).await.unwrap();

    let second = normalizer.normalize(&ALUMNI, None, &new_ref).await;
    assert!(matches!(
        second,
        NormalizeOutcome::Skipped(SkipReason::AlreadyNormalized)
    ));
    assert_eq!(store.get(&new_ref).await.unwrap(), before);
}

#[tokio::test]
async fn test_missing_upload_is_skipped() {
    let (_dir, store) = media_dir();

    let outcome = ImageNormalizer::new(store)
        .normalize(&ALUMNI, Some("images/Alumni/old.webp"), "images/Alumni/none.png")
        .await;

    assert!(matches!(
        outcome,
        NormalizeOutcome::Skipped(SkipReason::SourceMissing)
    ));
    assert!(outcome.to_delete().is_empty());
}

#[tokio::test]
async fn test_corrupt_upload_fails_without_deleting() {
    let (dir, store) = media_dir();
    store
        .put("images/Alumni/old.webp", create_png(4, 4).into())
        .await
        .unwrap();
    store
        .put("images/Alumni/broken.png", b"definitely not a png".to_vec().into())
        .await
        .unwrap();

    let outcome = ImageNormalizer::new(Arc::clone(&store))
        .normalize(&ALUMNI, Some("images/Alumni/old.webp"), "images/Alumni/broken.png")
        .await;

    assert!(matches!(
        outcome,
        NormalizeOutcome::Failed(NormalizeError::DecodeError { .. })
    ));
    assert!(outcome.changed_ref().is_none());
    assert!(dir.path().join("images/Alumni/broken.png").exists());
    assert!(dir.path().join("images/Alumni/old.webp").exists());
    assert!(!dir.path().join("images/Alumni/broken.webp").exists());

    let json = outcome.to_json();
    assert_eq!(json["status"], "failed");
}
