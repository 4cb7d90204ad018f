use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreError;

/// Trait for key-addressed byte storage.
///
/// Keys are relative, `/`-separated paths under a fixed root, e.g.
/// `images/Alumni/pic1.webp`. Implementations must be thread-safe.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` at `key`, replacing any existing blob.
    ///
    /// Intermediate "directories" are created implicitly.
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError>;

    /// Read the full blob at `key`.
    ///
    /// Returns `StoreError::NotFound` if no blob exists.
    async fn get(&self, key: &str) -> Result<Bytes, StoreError>;

    /// Check whether a blob exists at `key`.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Delete the blob at `key`.
    ///
    /// Deleting a key that does not exist is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Human-readable location of the store root (for logging).
    fn identifier(&self) -> &str;
}

#[async_trait]
impl<B: BlobStore + ?Sized> BlobStore for std::sync::Arc<B> {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError> {
        (**self).put(key, data).await
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        (**self).get(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        (**self).exists(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key).await
    }

    fn identifier(&self) -> &str {
        (**self).identifier()
    }
}

// =============================================================================
// Key Helpers
// =============================================================================

/// Validate a blob key.
///
/// Rejects empty keys, absolute paths, backslashes and any `.`/`..` segment so
/// that a key can never address something outside the store root.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let invalid = |reason| {
        Err(StoreError::InvalidKey {
            key: key.to_string(),
            reason,
        })
    };

    if key.is_empty() {
        return invalid("key is empty");
    }
    if key.starts_with('/') {
        return invalid("key must be relative");
    }
    if key.contains('\\') {
        return invalid("backslashes are not allowed");
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return invalid("key contains an empty or relative segment");
    }

    Ok(())
}

/// Reduce an uploaded file name to a safe single path component.
///
/// Directory parts are stripped and whitespace becomes `_`. Falls back to
/// `upload` when nothing usable remains.
pub fn sanitize_file_name(file_name: &str) -> String {
    let last = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .trim();

    let cleaned: String = last
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Split a file name into stem and extension (extension without the dot).
fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}

/// Pick a key under `dir` for a new upload that does not collide with an
/// existing blob.
///
/// Tries `dir/name.ext`, then `dir/name_1.ext`, `dir/name_2.ext`, ...
pub async fn available_key<B: BlobStore + ?Sized>(
    store: &B,
    dir: &str,
    file_name: &str,
) -> Result<String, StoreError> {
    available_key_with(store, dir, file_name, str::to_string).await
}

/// Like [`available_key`], but a candidate is also taken when the key
/// `derived(candidate)` exists.
///
/// Used when a blob stored at the candidate will later be rewritten to a
/// derived key, e.g. its `.webp` derivative.
pub async fn available_key_with<B, F>(
    store: &B,
    dir: &str,
    file_name: &str,
    derived: F,
) -> Result<String, StoreError>
where
    B: BlobStore + ?Sized,
    F: Fn(&str) -> String,
{
    let name = sanitize_file_name(file_name);
    let (stem, ext) = split_extension(&name);
    let dir = dir.trim_matches('/');

    let join = |candidate: &str| {
        if dir.is_empty() {
            candidate.to_string()
        } else {
            format!("{}/{}", dir, candidate)
        }
    };

    let mut key = join(&name);
    let mut suffix = 1u32;
    while is_taken(store, &key, &derived).await? {
        let candidate = match ext {
            Some(ext) => format!("{}_{}.{}", stem, suffix, ext),
            None => format!("{}_{}", stem, suffix),
        };
        key = join(&candidate);
        suffix += 1;
    }

    validate_key(&key)?;
    Ok(key)
}

async fn is_taken<B, F>(store: &B, key: &str, derived: &F) -> Result<bool, StoreError>
where
    B: BlobStore + ?Sized,
    F: Fn(&str) -> String,
{
    if store.exists(key).await? {
        return Ok(true);
    }
    let derived_key = derived(key);
    if derived_key == key {
        return Ok(false);
    }
    store.exists(&derived_key).await
}
