//! Local filesystem blob store.
//!
//! Blobs live under a single root directory (the media root). Keys map
//! directly onto relative paths beneath it.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use super::blob_store::{validate_key, BlobStore};
use crate::error::StoreError;

/// Filesystem-backed implementation of `BlobStore`.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    identifier: String,
}

impl LocalBlobStore {
    /// Create a store rooted at `root`.
    ///
    /// The directory does not need to exist yet; it is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let identifier = format!("file://{}", root.display());
        Self { root, identifier }
    }

    /// Get the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to its absolute path under the root.
    pub fn resolve(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |path, segment| path.join(segment)))
    }
}

fn fs_error(key: &str, err: std::io::Error) -> StoreError {
    if err.kind() == ErrorKind::NotFound {
        StoreError::NotFound(key.to_string())
    } else {
        StoreError::Filesystem {
            path: key.to_string(),
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError> {
        let path = self.resolve(key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Filesystem {
                    path: key.to_string(),
                    message: format!("creating parent directory: {}", e),
                })?;
        }

        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| StoreError::Filesystem {
                path: key.to_string(),
                message: e.to_string(),
            })
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let path = self.resolve(key)?;
        let data = tokio::fs::read(&path).await.map_err(|e| fs_error(key, e))?;
        Ok(Bytes::from(data))
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.resolve(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(fs_error(key, e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(fs_error(key, e)),
        }
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
