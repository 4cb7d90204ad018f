//! Image normalization pipeline.
//!
//! Runs after a record write that introduced or changed image bytes. It turns
//! the stored upload into a canonical WebP derivative and garbage-collects the
//! files the record no longer references.
//!
//! # Flow
//!
//! ```text
//!   raw bytes at current_ref
//!            │
//!            ▼
//!   ┌──────────────────┐   missing / empty           ┌─────────────────────┐
//!   │   source guard   │ ─────────────────────────▶ │ Skipped(SourceMissing)│
//!   └────────┬─────────┘                             └─────────────────────┘
//!            │   .webp and no previous ref           ┌──────────────────────────┐
//!            ├─────────────────────────────────────▶ │ Skipped(AlreadyNormalized)│
//!            ▼                                       └──────────────────────────┘
//!   ┌──────────────────┐   decode / encode / put fails
//!   │ decode → shrink  │ ──────────────────────────▶  Failed(error), no deletes
//!   │ → webp → put     │
//!   └────────┬─────────┘
//!            ▼
//!   ┌──────────────────┐
//!   │ plan + perform   │  superseded upload, previous image;
//!   │ deletions        │  never a sentinel, never new_ref
//!   └────────┬─────────┘
//!            ▼
//!      Normalized { new_ref, changed, to_delete }
//! ```
//!
//! The pipeline never returns an error past its boundary. The caller's record
//! write is already committed when it runs, so every failure degrades to
//! "upload accepted, derivative not produced".

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::codec::WebpTranscoder;
use super::policy::{is_webp_ref, ImageFamily, NormalizePolicy, NormalizeSettings};
use crate::error::NormalizeError;
use crate::storage::BlobStore;

// =============================================================================
// Outcome Types
// =============================================================================

/// Why the pipeline did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No bytes (or zero bytes) exist at the current reference
    SourceMissing,

    /// The reference is already `.webp` and the image did not change on this write
    AlreadyNormalized,
}

/// A derivative was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedImage {
    /// Key of the WebP derivative; the record's image reference after the write
    pub new_ref: String,

    /// Whether `new_ref` differs from the reference the record was written with
    pub changed: bool,

    /// Superseded blobs selected for deletion, in deletion order
    pub to_delete: Vec<String>,

    /// Subset of `to_delete` that could not be removed
    pub failed_deletes: Vec<String>,

    /// Derivative width in pixels
    pub width: u32,

    /// Derivative height in pixels
    pub height: u32,

    /// Size of the stored derivative in bytes
    pub bytes_written: usize,
}

/// Result of one pipeline run.
#[derive(Debug, Clone)]
pub enum NormalizeOutcome {
    /// A WebP derivative was written and orphans were cleaned up
    Normalized(NormalizedImage),

    /// Guards did not pass; nothing was read, written, or deleted
    Skipped(SkipReason),

    /// Decoding, encoding, or storing the derivative failed; nothing was deleted
    Failed(NormalizeError),
}

impl NormalizeOutcome {
    /// Returns true if a derivative was produced.
    pub fn is_normalized(&self) -> bool {
        matches!(self, NormalizeOutcome::Normalized(_))
    }

    /// The normalized image, if any.
    pub fn normalized(&self) -> Option<&NormalizedImage> {
        match self {
            NormalizeOutcome::Normalized(image) => Some(image),
            _ => None,
        }
    }

    /// The new reference, if the record's image reference must change.
    pub fn changed_ref(&self) -> Option<&str> {
        self.normalized()
            .filter(|image| image.changed)
            .map(|image| image.new_ref.as_str())
    }

    /// Keys selected for deletion (empty unless normalized).
    pub fn to_delete(&self) -> &[String] {
        self.normalized()
            .map(|image| image.to_delete.as_slice())
            .unwrap_or(&[])
    }

    /// JSON summary, for CLI output and logs.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            NormalizeOutcome::Normalized(image) => serde_json::json!({
                "status": "normalized",
                "new_ref": image.new_ref,
                "changed": image.changed,
                "to_delete": image.to_delete,
                "failed_deletes": image.failed_deletes,
                "width": image.width,
                "height": image.height,
                "bytes_written": image.bytes_written,
            }),
            NormalizeOutcome::Skipped(reason) => serde_json::json!({
                "status": "skipped",
                "reason": reason,
            }),
            NormalizeOutcome::Failed(err) => serde_json::json!({
                "status": "failed",
                "error": err.to_string(),
            }),
        }
    }
}

// =============================================================================
// Normalizer
// =============================================================================

/// The one normalization routine shared by every image-bearing family.
///
/// Families differ only by their [`ImageFamily`] (sentinel and upload dir);
/// the bounding box and quality come from [`NormalizeSettings`].
///
/// # Example
///
/// ```ignore
/// use stac_media::normalize::ImageNormalizer;
/// use stac_media::records::ALUMNI;
///
/// let normalizer = ImageNormalizer::new(store);
/// let outcome = normalizer
///     .normalize(&ALUMNI, None, "images/Alumni/pic1.png")
///     .await;
///
/// if let Some(new_ref) = outcome.changed_ref() {
///     // second, partial write of the record's image reference
/// }
/// ```
pub struct ImageNormalizer<B: BlobStore + ?Sized> {
    store: Arc<B>,
    settings: NormalizeSettings,
}

impl<B: BlobStore + ?Sized> Clone for ImageNormalizer<B> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            settings: self.settings,
        }
    }
}

impl<B: BlobStore + ?Sized> ImageNormalizer<B> {
    /// Create a normalizer with the default 720×1080 box and quality 90.
    pub fn new(store: Arc<B>) -> Self {
        Self::with_settings(store, NormalizeSettings::default())
    }

    /// Create a normalizer with custom settings.
    pub fn with_settings(store: Arc<B>, settings: NormalizeSettings) -> Self {
        Self { store, settings }
    }

    /// The blob store the pipeline reads and writes.
    pub fn store(&self) -> &Arc<B> {
        &self.store
    }

    /// Bounding box and quality in use.
    pub fn settings(&self) -> NormalizeSettings {
        self.settings
    }

    /// Build the policy for a family.
    pub fn policy(&self, family: &ImageFamily) -> NormalizePolicy {
        NormalizePolicy::for_family(family, self.settings)
    }

    /// Normalize the blob at `current_ref`, reading it from the store.
    ///
    /// `previous_ref` is the record's image reference before this write, present
    /// only when the write changed the image.
    pub async fn normalize(
        &self,
        family: &ImageFamily,
        previous_ref: Option<&str>,
        current_ref: &str,
    ) -> NormalizeOutcome {
        let raw = match self.store.get(current_ref).await {
            Ok(data) => Some(data),
            Err(e) => {
                if !e.is_not_found() {
                    warn!(
                        family = family.name,
                        path = current_ref,
                        error = %e,
                        "Could not read uploaded image"
                    );
                }
                None
            }
        };

        self.normalize_bytes(family, previous_ref, current_ref, raw)
            .await
    }

    /// Normalize with the raw bytes already in hand.
    pub async fn normalize_bytes(
        &self,
        family: &ImageFamily,
        previous_ref: Option<&str>,
        current_ref: &str,
        raw: Option<Bytes>,
    ) -> NormalizeOutcome {
        let policy = self.policy(family);
        self.normalize_with_policy(&policy, previous_ref, current_ref, raw)
            .await
    }

    /// Run the pipeline against an explicit policy.
    pub async fn normalize_with_policy(
        &self,
        policy: &NormalizePolicy,
        previous_ref: Option<&str>,
        current_ref: &str,
        raw: Option<Bytes>,
    ) -> NormalizeOutcome {
        // Guard 1: the upload must exist and be non-empty
        let raw = match raw {
            Some(data) if !data.is_empty() => data,
            _ => {
                debug!(path = current_ref, "No source bytes, skipping normalization");
                return NormalizeOutcome::Skipped(SkipReason::SourceMissing);
            }
        };

        // Guard 2: already canonical and unchanged on this write
        if is_webp_ref(current_ref) && previous_ref.is_none() {
            debug!(path = current_ref, "Image already normalized");
            return NormalizeOutcome::Skipped(SkipReason::AlreadyNormalized);
        }

        let new_ref = policy.derive_webp_ref(current_ref);

        // Decode/resize/encode is CPU-bound
        let transcoder = WebpTranscoder::from_policy(policy);
        let source_path = current_ref.to_string();
        let encoded = match tokio::task::spawn_blocking(move || {
            transcoder.transcode(&source_path, &raw)
        })
        .await
        {
            Ok(Ok(encoded)) => encoded,
            Ok(Err(err)) => {
                warn!(path = current_ref, error = %err, "Image normalization failed");
                return NormalizeOutcome::Failed(err);
            }
            Err(join_err) => {
                let err = NormalizeError::EncodeError {
                    path: current_ref.to_string(),
                    message: format!("transcode task failed: {}", join_err),
                };
                warn!(path = current_ref, error = %err, "Image normalization failed");
                return NormalizeOutcome::Failed(err);
            }
        };

        let bytes_written = encoded.data.len();
        if let Err(source) = self.store.put(&new_ref, encoded.data).await {
            let err = NormalizeError::Storage {
                path: new_ref,
                source,
            };
            warn!(path = current_ref, error = %err, "Could not store normalized image");
            return NormalizeOutcome::Failed(err);
        }

        let changed = new_ref != current_ref;
        let to_delete = self
            .plan_deletions(policy, previous_ref, current_ref, &new_ref)
            .await;
        let failed_deletes = self.delete_all(&to_delete).await;

        info!(
            source = current_ref,
            derivative = %new_ref,
            width = encoded.width,
            height = encoded.height,
            bytes = bytes_written,
            deleted = to_delete.len() - failed_deletes.len(),
            "Normalized image"
        );

        NormalizeOutcome::Normalized(NormalizedImage {
            new_ref,
            changed,
            to_delete,
            failed_deletes,
            width: encoded.width,
            height: encoded.height,
            bytes_written,
        })
    }

    /// Select superseded blobs for deletion.
    ///
    /// Candidates, in order: the raw upload (when renamed) and the previous
    /// image. A candidate must exist, must not be a protected sentinel, and
    /// must not be `new_ref`.
    async fn plan_deletions(
        &self,
        policy: &NormalizePolicy,
        previous_ref: Option<&str>,
        current_ref: &str,
        new_ref: &str,
    ) -> Vec<String> {
        let mut to_delete: Vec<String> = Vec::new();

        if current_ref != new_ref
            && !policy.is_protected(current_ref)
            && self.blob_exists(current_ref).await
        {
            to_delete.push(current_ref.to_string());
        }

        // After this write the record points at new_ref
        if let Some(previous) = previous_ref {
            if previous != new_ref
                && !policy.is_protected(previous)
                && !to_delete.iter().any(|key| key == previous)
                && self.blob_exists(previous).await
            {
                to_delete.push(previous.to_string());
            }
        }

        to_delete
    }

    async fn blob_exists(&self, key: &str) -> bool {
        match self.store.exists(key).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(path = key, error = %e, "Could not check blob before deletion");
                false
            }
        }
    }

    /// Delete every key, best effort. Returns the keys that failed.
    async fn delete_all(&self, keys: &[String]) -> Vec<String> {
        let mut failed = Vec::new();
        for key in keys {
            if let Err(e) = self.store.delete(key).await {
                warn!(path = %key, error = %e, "Failed to delete superseded image");
                failed.push(key.clone());
            } else {
                debug!(path = %key, "Deleted superseded image");
            }
        }
        failed
    }
}

// =============================================================================
// Tests
// =============================================================================
