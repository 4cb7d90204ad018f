use thiserror::Error;

/// Errors that can occur when talking to a blob store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// No blob exists at the given key
    #[error("Blob not found: {0}")]
    NotFound(String),

    /// Key is empty, absolute, or escapes the store root
    #[error("Invalid blob key '{key}': {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// Local filesystem error
    #[error("Filesystem error on {path}: {message}")]
    Filesystem { path: String, message: String },

    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    S3(String),

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),
}

impl StoreError {
    /// Returns true if this error means the blob simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Reasons the image normalization pipeline could not produce a derivative.
///
/// None of these are fatal to the surrounding record write: the record keeps
/// the reference it was written with.
#[derive(Debug, Clone, Error)]
pub enum NormalizeError {
    /// The uploaded bytes are not a decodable image
    #[error("Failed to decode image {path}: {message}")]
    DecodeError { path: String, message: String },

    /// The resized image could not be encoded as WebP
    #[error("Failed to encode WebP for {path}: {message}")]
    EncodeError { path: String, message: String },

    /// The derivative could not be written to the blob store
    #[error("Failed to store derivative {path}: {source}")]
    Storage {
        path: String,
        #[source]
        source: StoreError,
    },
}

/// Errors raised by the record store.
#[derive(Debug, Clone, Error)]
pub enum RecordError {
    /// No record with this id exists in the table
    #[error("{table} record {id} not found")]
    NotFound { table: &'static str, id: u64 },

    /// A unique field already holds this value
    #[error("{table} already has a record with {field} '{value}'")]
    Duplicate {
        table: &'static str,
        field: &'static str,
        value: String,
    },

    /// Storing the raw upload failed
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// The catalog snapshot could not be read or written
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// A record payload could not be parsed
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}
