//! S3-backed blob store.
//!
//! Keys are stored under an optional prefix inside a single bucket, so the
//! same media layout (`images/Alumni/...`) works against AWS S3, MinIO, or
//! any S3-compatible service.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;

use super::blob_store::{validate_key, BlobStore};
use crate::error::StoreError;

/// S3 implementation of `BlobStore`.
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
    prefix: String,
    identifier: String,
}

impl S3BlobStore {
    /// Create a store for `bucket`, optionally rooted at `prefix`.
    ///
    /// The prefix is normalized to end with a single `/` (or be empty).
    pub fn new(client: Client, bucket: String, prefix: Option<String>) -> Self {
        let prefix = prefix
            .map(|p| p.trim_matches('/').to_string())
            .filter(|p| !p.is_empty())
            .map(|p| format!("{}/", p))
            .unwrap_or_default();
        let identifier = format!("s3://{}/{}", bucket, prefix);

        Self {
            client,
            bucket,
            prefix,
            identifier,
        }
    }

    /// Get the bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Get the key prefix (empty or ending in `/`).
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Map a blob key to the full object key.
    pub fn object_key(&self, key: &str) -> Result<String, StoreError> {
        validate_key(key)?;
        Ok(format!("{}{}", self.prefix, key))
    }

    fn location(&self, object_key: &str) -> String {
        format!("s3://{}/{}", self.bucket, object_key)
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError> {
        let object_key = self.object_key(key)?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StoreError::S3(e.to_string()))?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let object_key = self.object_key(key)?;

        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|e| {
                let is_no_such_key = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false);

                let status_is_404 = e
                    .raw_response()
                    .map(|r| r.status().as_u16() == 404)
                    .unwrap_or(false);

                if is_no_such_key || status_is_404 {
                    StoreError::NotFound(self.location(&object_key))
                } else {
                    StoreError::S3(e.to_string())
                }
            })?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?
            .into_bytes();

        Ok(data)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let object_key = self.object_key(key)?;

        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let is_not_found = e
                    .as_service_error()
                    .map(|se| se.is_not_found())
                    .unwrap_or(false);

                let status_is_404 = e
                    .raw_response()
                    .map(|r| r.status().as_u16() == 404)
                    .unwrap_or(false);

                // Fallback: check the error string for common patterns
                let err_str = e.to_string();
                if is_not_found
                    || status_is_404
                    || err_str.contains("NotFound")
                    || err_str.contains("NoSuchKey")
                {
                    Ok(false)
                } else {
                    Err(StoreError::S3(err_str))
                }
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let object_key = self.object_key(key)?;

        // S3 DeleteObject succeeds for missing keys, which matches the trait contract
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|e| StoreError::S3(e.to_string()))?;

        Ok(())
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Create an S3 client with optional custom endpoint and region.
///
/// Use a custom endpoint for S3-compatible services like MinIO:
/// ```ignore
/// let client = create_s3_client(Some("http://localhost:9000"), "us-east-1").await;
/// ```
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;

    // S3-compatible services usually need path-style addressing
    let s3_config = if endpoint_url.is_some() {
        aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build()
    } else {
        aws_sdk_s3::config::Builder::from(&sdk_config).build()
    };

    Client::from_conf(s3_config)
}
