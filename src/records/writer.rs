//! Record write path with image normalization.
//!
//! Every create or update of an image-bearing record goes through
//! [`RecordWriter`]:
//!
//! 1. lock the record id
//! 2. capture the previous image reference when the image changes
//! 3. store the raw upload under the family's upload directory
//! 4. first write (all fields)
//! 5. run the normalization pipeline
//! 6. if the reference was renamed, second partial write of the image field
//!
//! Steps 4-6 are not atomic. A crash between the first write and the partial
//! write leaves the record pointing at the raw upload (or, after the pipeline
//! deleted it, at a key with no blob). There is no pending-operation log or
//! reconciliation sweep.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use super::entities::ImageRecord;
use super::table::{KeyedLocks, Stored, Table};
use crate::error::RecordError;
use crate::normalize::{replace_extension_with_webp, ImageNormalizer, NormalizeOutcome};
use crate::storage::{available_key_with, BlobStore};

/// A raw file submitted with a record write.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Client-supplied file name; only the final component is kept
    pub file_name: String,

    /// File contents
    pub data: Bytes,
}

impl Upload {
    /// Create an upload.
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            data: data.into(),
        }
    }
}

/// Result of a record write.
#[derive(Debug, Clone)]
pub struct SaveReport<T> {
    /// The record as persisted after the final write
    pub record: Stored<T>,

    /// What the normalization pipeline did
    pub outcome: NormalizeOutcome,
}

/// Writes image-bearing records and runs the pipeline on each write.
pub struct RecordWriter<B: BlobStore + ?Sized> {
    normalizer: ImageNormalizer<B>,
    locks: Arc<KeyedLocks>,
}

impl<B: BlobStore + ?Sized> Clone for RecordWriter<B> {
    fn clone(&self) -> Self {
        Self {
            normalizer: self.normalizer.clone(),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<B: BlobStore + ?Sized> RecordWriter<B> {
    /// Create a writer with its own lock registry.
    pub fn new(normalizer: ImageNormalizer<B>) -> Self {
        Self::with_locks(normalizer, Arc::new(KeyedLocks::new()))
    }

    /// Create a writer sharing a lock registry with other writers.
    pub fn with_locks(normalizer: ImageNormalizer<B>, locks: Arc<KeyedLocks>) -> Self {
        Self { normalizer, locks }
    }

    /// The pipeline used on every write.
    pub fn normalizer(&self) -> &ImageNormalizer<B> {
        &self.normalizer
    }

    /// The per-record lock registry.
    pub fn locks(&self) -> &Arc<KeyedLocks> {
        &self.locks
    }

    /// Create a record, optionally with an uploaded image.
    pub async fn create<T: ImageRecord>(
        &self,
        table: &Table<T>,
        mut record: T,
        upload: Option<Upload>,
    ) -> Result<SaveReport<T>, RecordError> {
        let uploaded = match upload {
            Some(upload) => Some(self.store_upload(&mut record, upload).await?),
            None => None,
        };

        let stored = match table.insert(record).await {
            Ok(stored) => stored,
            Err(e) => {
                self.discard_upload(uploaded.as_deref()).await;
                return Err(e);
            }
        };

        let _guard = self
            .locks
            .lock(KeyedLocks::record_key(table.name(), stored.id))
            .await;

        debug!(table = table.name(), id = stored.id, "Created record");
        self.finish(table, stored, None).await
    }

    /// Replace every field of an existing record, optionally with a new upload.
    ///
    /// When `upload` is given, it overrides `record`'s image reference.
    pub async fn update<T: ImageRecord>(
        &self,
        table: &Table<T>,
        id: u64,
        record: T,
        upload: Option<Upload>,
    ) -> Result<SaveReport<T>, RecordError> {
        let _guard = self
            .locks
            .lock(KeyedLocks::record_key(table.name(), id))
            .await;

        let existing = table.require(id).await?;
        self.update_locked(table, existing, record, upload).await
    }

    /// Replace only the image of an existing record.
    ///
    /// The other fields are read under the record lock, so edits committed
    /// while waiting for it are kept.
    pub async fn set_image<T: ImageRecord>(
        &self,
        table: &Table<T>,
        id: u64,
        upload: Upload,
    ) -> Result<SaveReport<T>, RecordError> {
        let _guard = self
            .locks
            .lock(KeyedLocks::record_key(table.name(), id))
            .await;

        let existing = table.require(id).await?;
        let record = existing.record.clone();
        self.update_locked(table, existing, record, Some(upload)).await
    }

    /// Body of an update. The caller holds the record lock.
    async fn update_locked<T: ImageRecord>(
        &self,
        table: &Table<T>,
        existing: Stored<T>,
        mut record: T,
        upload: Option<Upload>,
    ) -> Result<SaveReport<T>, RecordError> {
        let id = existing.id;

        let uploaded = match upload {
            Some(upload) => Some(self.store_upload(&mut record, upload).await?),
            None => None,
        };

        let previous_ref = (existing.record.image_ref() != record.image_ref())
            .then(|| existing.record.image_ref().to_string());

        let stored = match table.replace(id, record).await {
            Ok(stored) => stored,
            Err(e) => {
                self.discard_upload(uploaded.as_deref()).await;
                return Err(e);
            }
        };

        debug!(
            table = table.name(),
            id,
            previous = previous_ref.as_deref().unwrap_or(""),
            "Updated record"
        );
        self.finish(table, stored, previous_ref).await
    }

    /// Run the pipeline after the first write and apply a renamed reference.
    async fn finish<T: ImageRecord>(
        &self,
        table: &Table<T>,
        stored: Stored<T>,
        previous_ref: Option<String>,
    ) -> Result<SaveReport<T>, RecordError> {
        let family = stored.record.family();
        let outcome = self
            .normalizer
            .normalize(family, previous_ref.as_deref(), stored.record.image_ref())
            .await;

        let record = match outcome.changed_ref() {
            Some(new_ref) => {
                let updated = table.set_image_ref(stored.id, new_ref).await?;
                info!(
                    table = table.name(),
                    id = stored.id,
                    image = new_ref,
                    "Image reference updated"
                );
                updated
            }
            None => stored,
        };

        Ok(SaveReport { record, outcome })
    }

    /// Store an upload under the family directory and point the record at it.
    ///
    /// A name is only free when its `.webp` derivative is free too, so two
    /// records never normalize onto the same blob.
    async fn store_upload<T: ImageRecord>(
        &self,
        record: &mut T,
        upload: Upload,
    ) -> Result<String, RecordError> {
        let store = self.normalizer.store();
        let key = available_key_with(
            store.as_ref(),
            record.family().upload_dir,
            &upload.file_name,
            replace_extension_with_webp,
        )
        .await?;
        store.put(&key, upload.data).await?;

        debug!(family = record.family().name, key = %key, "Stored upload");
        record.set_image_ref(key.clone());
        Ok(key)
    }

    async fn discard_upload(&self, key: Option<&str>) {
        if let Some(key) = key {
            if let Err(e) = self.normalizer.store().delete(key).await {
                warn!(key, error = %e, "Failed to remove upload of rejected write");
            }
        }
    }
}
