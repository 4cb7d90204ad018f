//! Record write path tests.
//!
//! Tests verify:
//! - Creating and updating records stores a WebP derivative and points the
//!   record at it
//! - Superseded images are cleaned up; placeholders are kept
//! - Concurrent writes to one record leave exactly one derivative
//! - Catalog snapshots survive a reload

use std::sync::Arc;

use stac_media::{
    Alumni, BlobStore, Catalog, Event, EventKind, ImageNormalizer, KeyedLocks, MemoryBlobStore,
    NormalizeOutcome, Photo, RecordError, RecordWriter, SkipReason, Upload,
};
use tempfile::TempDir;

use super::test_utils::{create_jpeg, create_png};

fn alumni(name: &str) -> Alumni {
    serde_json::from_value(serde_json::json!({
        "name": name,
        "email": format!("{}@example.com", name.to_lowercase()),
        "message": "Clear skies!",
        "linkedin_url": "",
        "instagram_url": "",
    }))
    .unwrap()
}

fn writer(store: &Arc<MemoryBlobStore>) -> RecordWriter<MemoryBlobStore> {
    RecordWriter::new(ImageNormalizer::new(Arc::clone(store)))
}

async fn keys_under(store: &MemoryBlobStore, dir: &str) -> Vec<String> {
    store
        .keys()
        .await
        .into_iter()
        .filter(|key| key.starts_with(dir))
        .collect()
}

// =============================================================================
// Create and Update
// =============================================================================

#[tokio::test]
async fn test_create_with_upload_stores_only_webp() {
    let store = Arc::new(MemoryBlobStore::new());
    let writer = writer(&store);
    let catalog = Catalog::new();

    let report = writer
        .create(
            &catalog.alumni,
            alumni("Asha"),
            Some(Upload::new("Portrait.PNG", create_png(1600, 1200))),
        )
        .await
        .unwrap();

    let image = report.record.record.image.clone();
    assert!(image.starts_with("images/Alumni/"));
    assert!(image.ends_with(".webp"));
    assert_eq!(keys_under(&store, "images/").await, vec![image.clone()]);

    // The stored row sees the second write
    let row = catalog.alumni.require(report.record.id).await.unwrap();
    assert_eq!(row.record.image, image);
    assert_eq!(report.outcome.normalized().unwrap().width, 720);
}

#[tokio::test]
async fn test_create_without_upload_keeps_placeholder() {
    let store = Arc::new(MemoryBlobStore::new());
    let catalog = Catalog::new();

    let report = writer(&store)
        .create(&catalog.alumni, alumni("Ravi"), None)
        .await
        .unwrap();

    assert_eq!(report.record.record.image, "default.webp");
    assert!(matches!(
        report.outcome,
        NormalizeOutcome::Skipped(SkipReason::AlreadyNormalized)
    ));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_set_image_replaces_previous_derivative() {
    let store = Arc::new(MemoryBlobStore::new());
    let writer = writer(&store);
    let catalog = Catalog::new();

    let photo = Photo {
        name: "Orion".to_string(),
        image: "default.jpg".to_string(),
        description: None,
    };
    let created = writer
        .create(
            &catalog.photos,
            photo,
            Some(Upload::new("orion.jpg", create_jpeg(200, 100))),
        )
        .await
        .unwrap();
    let first = created.record.record.image.clone();
    assert_eq!(first, "images/photogallery/orion.webp");

    let updated = writer
        .set_image(
            &catalog.photos,
            created.record.id,
            Upload::new("orion-2024.png", create_png(50, 50)),
        )
        .await
        .unwrap();

    assert_eq!(updated.record.record.image, "images/photogallery/orion-2024.webp");
    assert!(updated.outcome.to_delete().contains(&first));
    assert_eq!(
        keys_under(&store, "images/").await,
        vec!["images/photogallery/orion-2024.webp".to_string()]
    );
}

#[tokio::test]
async fn test_event_update_without_new_image_is_untouched() {
    let store = Arc::new(MemoryBlobStore::new());
    let writer = writer(&store);
    let catalog = Catalog::new();

    let event = Event {
        kind: EventKind::Zenith,
        name: "Zenith 2025".to_string(),
        image: "default.jpg".to_string(),
        description: None,
        problem_statement: String::new(),
    };
    let created = writer
        .create(
            catalog.events(EventKind::Zenith),
            event,
            Some(Upload::new("poster.png", create_png(20, 20))),
        )
        .await
        .unwrap();
    let image = created.record.record.image.clone();

    let mut edited = created.record.record.clone();
    edited.problem_statement = "Track the ISS".to_string();
    let updated = writer
        .update(catalog.events(EventKind::Zenith), created.record.id, edited, None)
        .await
        .unwrap();

    assert!(matches!(
        updated.outcome,
        NormalizeOutcome::Skipped(SkipReason::AlreadyNormalized)
    ));
    assert_eq!(updated.record.record.image, image);
    assert_eq!(updated.record.record.problem_statement, "Track the ISS");
    assert!(store.exists(&image).await.unwrap());
}

#[tokio::test]
async fn test_corrupt_upload_still_saves_record() {
    let store = Arc::new(MemoryBlobStore::new());
    let catalog = Catalog::new();

    let report = writer(&store)
        .create(
            &catalog.alumni,
            alumni("Meera"),
            Some(Upload::new("scan.png", b"not an image".to_vec())),
        )
        .await
        .unwrap();

    assert!(matches!(report.outcome, NormalizeOutcome::Failed(_)));
    assert_eq!(report.record.record.image, "images/Alumni/scan.png");
    assert_eq!(catalog.alumni.len().await, 1);
    assert!(store.exists("images/Alumni/scan.png").await.unwrap());
}

#[tokio::test]
async fn test_duplicate_name_is_rejected() {
    let store = Arc::new(MemoryBlobStore::new());
    let writer = writer(&store);
    let catalog = Catalog::new();

    let photo = Photo {
        name: "Andromeda".to_string(),
        image: "default.jpg".to_string(),
        description: None,
    };
    writer
        .create(&catalog.photos, photo.clone(), None)
        .await
        .unwrap();

    let result = writer
        .create(
            &catalog.photos,
            photo,
            Some(Upload::new("m31.png", create_png(8, 8))),
        )
        .await;

    assert!(matches!(result, Err(RecordError::Duplicate { .. })));
    assert!(keys_under(&store, "images/").await.is_empty());
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_concurrent_image_updates_leave_one_derivative() {
    let store = Arc::new(MemoryBlobStore::new());
    let writer = writer(&store);
    let catalog = Arc::new(Catalog::new());

    let created = writer
        .create(&catalog.alumni, alumni("Kiran"), None)
        .await
        .unwrap();
    let id = created.record.id;

    let mut handles = Vec::new();
    for i in 0..4 {
        let writer = writer.clone();
        let catalog = Arc::clone(&catalog);
        handles.push(tokio::spawn(async move {
            writer
                .set_image(
                    &catalog.alumni,
                    id,
                    Upload::new(format!("take{}.png", i), create_png(16 + i, 16)),
                )
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let row = catalog.alumni.require(id).await.unwrap();
    assert_eq!(keys_under(&store, "images/").await, vec![row.record.image]);
    assert_eq!(writer.locks().active(), 0);
}

#[tokio::test]
async fn test_records_uploading_same_file_name_stay_independent() {
    let store = Arc::new(MemoryBlobStore::new());
    let writer = writer(&store);
    let catalog = Catalog::new();

    let a = writer
        .create(
            &catalog.alumni,
            alumni("Asha"),
            Some(Upload::new("pic.png", create_png(40, 40))),
        )
        .await
        .unwrap();
    let b = writer
        .create(
            &catalog.alumni,
            alumni("Ravi"),
            Some(Upload::new("pic.png", create_png(30, 30))),
        )
        .await
        .unwrap();
    assert_ne!(a.record.record.image, b.record.record.image);

    writer
        .set_image(
            &catalog.alumni,
            b.record.id,
            Upload::new("ravi.jpg", create_jpeg(20, 20)),
        )
        .await
        .unwrap();

    let a_row = catalog.alumni.require(a.record.id).await.unwrap();
    let b_row = catalog.alumni.require(b.record.id).await.unwrap();
    assert!(store.exists(&a_row.record.image).await.unwrap());
    assert!(store.exists(&b_row.record.image).await.unwrap());
    assert_eq!(
        keys_under(&store, "images/").await,
        vec![
            "images/Alumni/pic.webp".to_string(),
            "images/Alumni/ravi.webp".to_string()
        ]
    );
}

#[tokio::test]
async fn test_field_edit_during_image_update_is_kept() {
    let store = Arc::new(MemoryBlobStore::new());
    let writer = writer(&store);
    let catalog = Arc::new(Catalog::new());

    let created = writer
        .create(&catalog.alumni, alumni("Kiran"), None)
        .await
        .unwrap();
    let id = created.record.id;

    let guard = writer
        .locks()
        .lock(KeyedLocks::record_key(catalog.alumni.name(), id))
        .await;

    let pending = {
        let writer = writer.clone();
        let catalog = Arc::clone(&catalog);
        tokio::spawn(async move {
            writer
                .set_image(
                    &catalog.alumni,
                    id,
                    Upload::new("kiran.png", create_png(24, 24)),
                )
                .await
        })
    };
    tokio::task::yield_now().await;

    let mut edited = created.record.record.clone();
    edited.message = "Now at the observatory".to_string();
    catalog.alumni.replace(id, edited).await.unwrap();
    drop(guard);

    pending.await.unwrap().unwrap();

    let row = catalog.alumni.require(id).await.unwrap();
    assert_eq!(row.record.message, "Now at the observatory");
    assert_eq!(row.record.image, "images/Alumni/kiran.webp");
}

// =============================================================================
// Snapshots
// =============================================================================

#[tokio::test]
async fn test_catalog_survives_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data").join("catalog.json");

    let store = Arc::new(MemoryBlobStore::new());
    let catalog = Catalog::new();
    writer(&store)
        .create(
            &catalog.alumni,
            alumni("Asha"),
            Some(Upload::new("asha.png", create_png(10, 10))),
        )
        .await
        .unwrap();
    catalog.persist(&path).await.unwrap();

    let reloaded = Catalog::load(&path).await.unwrap();
    let rows = reloaded.alumni.list().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].record.image, "images/Alumni/asha.webp");

    // Ids keep counting after a reload
    let next = reloaded.alumni.insert(alumni("Ravi")).await.unwrap();
    assert!(next.id > rows[0].id);
}
