//! HTTP request handlers for the public read-only API.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /api/alumni` - Alumni list
//! - `GET /api/coreteam` - Core team list (with `position_display`)
//! - `GET /api/events/{kind}` - One event series
//! - `GET /api/photogallery`, `GET /api/videogallery` - Galleries
//! - `GET /api/homepage` - Projects, club activities, achievements, fests
//! - `GET /api/notifications/{all,active}` - Notifications, newest first
//! - `GET /media/{*path}` - Stored image blobs

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};
use url::Url;

use crate::error::{RecordError, StoreError};
use crate::records::{Catalog, EventKind, ImageRecord, Notification, Stored};
use crate::storage::BlobStore;

/// Path under which blobs are served.
pub const MEDIA_PATH: &str = "/media/";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<B: BlobStore + ?Sized> {
    /// All site records
    pub catalog: Arc<Catalog>,

    /// Blob store holding the images
    pub store: Arc<B>,

    /// Absolute base for image URLs; derived from the `Host` header when unset
    pub media_base_url: Option<Url>,

    /// Cache-Control max-age for media responses, in seconds
    pub cache_max_age: u32,
}

impl<B: BlobStore + ?Sized> AppState<B> {
    /// Create application state with a 1 hour media cache.
    pub fn new(catalog: Arc<Catalog>, store: Arc<B>) -> Self {
        Self {
            catalog,
            store,
            media_base_url: None,
            cache_max_age: 3600,
        }
    }

    /// Set a fixed media base URL.
    pub fn with_media_base_url(mut self, url: Option<Url>) -> Self {
        self.media_base_url = url;
        self
    }

    /// Set the media Cache-Control max-age.
    pub fn with_cache_max_age(mut self, cache_max_age: u32) -> Self {
        self.cache_max_age = cache_max_age;
        self
    }

    /// Resolve the base URL for image links on this request.
    fn media_base(&self, headers: &HeaderMap) -> Result<Url, ApiError> {
        if let Some(base) = &self.media_base_url {
            return Ok(base.clone());
        }

        let host = headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::MissingHost)?;

        Url::parse(&format!("http://{}{}", host, MEDIA_PATH))
            .map_err(|_| ApiError::InvalidHost(host.to_string()))
    }
}

impl<B: BlobStore + ?Sized> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
            store: Arc::clone(&self.store),
            media_base_url: self.media_base_url.clone(),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_key")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Blob store location
    pub storage: String,
}

/// Homepage sections.
#[derive(Debug, Serialize)]
pub struct HomePageResponse {
    pub projects: Vec<Value>,
    pub clubactivity: Vec<Value>,
    pub achievements: Vec<Value>,
    pub fests: Vec<Value>,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Errors surfaced by the API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unknown event series: {0}")]
    UnknownEventKind(String),

    #[error("Request has no Host header and no media base URL is configured")]
    MissingHost,

    #[error("Invalid Host header: {0}")]
    InvalidHost(String),

    #[error("Failed to render record: {0}")]
    Render(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Map an error to status, type identifier, and message.
fn classify(err: &ApiError) -> (StatusCode, &'static str) {
    match err {
        ApiError::UnknownEventKind(_) => (StatusCode::NOT_FOUND, "not_found"),
        ApiError::MissingHost | ApiError::InvalidHost(_) => {
            (StatusCode::BAD_REQUEST, "invalid_host")
        }
        ApiError::Render(_) => (StatusCode::INTERNAL_SERVER_ERROR, "render_error"),
        ApiError::Store(StoreError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
        ApiError::Store(StoreError::InvalidKey { .. }) => (StatusCode::BAD_REQUEST, "invalid_key"),
        ApiError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
        ApiError::Record(RecordError::NotFound { .. }) => (StatusCode::NOT_FOUND, "not_found"),
        ApiError::Record(_) => (StatusCode::INTERNAL_SERVER_ERROR, "record_error"),
    }
}

/// Convert ApiError to HTTP response.
///
/// 5xx errors are logged at ERROR, 404s at DEBUG, other 4xx at WARN.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = classify(&self);
        let message = self.to_string();

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Resource not found: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        ApiError::Store(self).into_response()
    }
}

// =============================================================================
// Rendering
// =============================================================================

/// Absolute URL for an image reference, or null when the record has none.
pub fn image_url(base: &Url, image_ref: &str) -> Value {
    if image_ref.is_empty() {
        return Value::Null;
    }
    // "./" keeps a colon in the first segment from reading as a scheme
    match base.join(&format!("./{}", image_ref)) {
        Ok(url) => Value::String(url.to_string()),
        Err(_) => Value::Null,
    }
}

/// Serialize a row, replacing the stored image key with its absolute URL
/// under the record's image field name.
pub fn render_image_record<T: ImageRecord>(row: &Stored<T>, base: &Url) -> Result<Value, ApiError> {
    let mut value = serde_json::to_value(row).map_err(|e| ApiError::Render(e.to_string()))?;

    if let Value::Object(map) = &mut value {
        map.remove("image");
        map.insert(
            T::IMAGE_FIELD.to_string(),
            image_url(base, row.record.image_ref()),
        );
    }

    Ok(value)
}

fn render_rows<T: ImageRecord>(rows: &[Stored<T>], base: &Url) -> Result<Vec<Value>, ApiError> {
    rows.iter().map(|row| render_image_record(row, base)).collect()
}

fn render_plain<T: Serialize>(rows: &[T]) -> Result<Vec<Value>, ApiError> {
    rows.iter()
        .map(|row| serde_json::to_value(row).map_err(|e| ApiError::Render(e.to_string())))
        .collect()
}

/// Content type for a blob key, from its extension.
pub fn content_type_for(key: &str) -> &'static str {
    let ext = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "webp" => "image/webp",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle health check requests.
///
/// `GET /health`
pub async fn health_handler<B: BlobStore + ?Sized>(
    State(state): State<AppState<B>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage: state.store.identifier().to_string(),
    })
}

/// `GET /api/alumni`
pub async fn alumni_handler<B: BlobStore + ?Sized>(
    State(state): State<AppState<B>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Value>>, ApiError> {
    let base = state.media_base(&headers)?;
    let rows = state.catalog.alumni.list().await;
    Ok(Json(render_rows(&rows, &base)?))
}

/// `GET /api/coreteam`
///
/// Each member carries `position` (code) and `position_display` (label).
pub async fn core_team_handler<B: BlobStore + ?Sized>(
    State(state): State<AppState<B>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Value>>, ApiError> {
    let base = state.media_base(&headers)?;
    let rows = state.catalog.core_team.list().await;

    let mut members = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut value = render_image_record(row, &base)?;
        if let Value::Object(map) = &mut value {
            map.insert(
                "position_display".to_string(),
                Value::from(row.record.position.display()),
            );
        }
        members.push(value);
    }

    Ok(Json(members))
}

/// `GET /api/events/{kind}` where kind is astrax, pleiades, zenith or utkarsh.
pub async fn events_handler<B: BlobStore + ?Sized>(
    State(state): State<AppState<B>>,
    Path(kind): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<Value>>, ApiError> {
    let kind = EventKind::parse(&kind).ok_or(ApiError::UnknownEventKind(kind))?;
    let base = state.media_base(&headers)?;
    let rows = state.catalog.events(kind).list().await;

    let mut events = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut value = render_image_record(row, &base)?;
        if let Value::Object(map) = &mut value {
            map.remove("kind");
            if !kind.has_problem_statement() {
                map.remove("problem_statement");
            }
        }
        events.push(value);
    }

    Ok(Json(events))
}

/// `GET /api/photogallery`
pub async fn photo_gallery_handler<B: BlobStore + ?Sized>(
    State(state): State<AppState<B>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Value>>, ApiError> {
    let base = state.media_base(&headers)?;
    let rows = state.catalog.photos.list().await;
    Ok(Json(render_rows(&rows, &base)?))
}

/// `GET /api/videogallery`
pub async fn video_gallery_handler<B: BlobStore + ?Sized>(
    State(state): State<AppState<B>>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let rows = state.catalog.videos.list().await;
    Ok(Json(render_plain(&rows)?))
}

/// `GET /api/homepage`
pub async fn homepage_handler<B: BlobStore + ?Sized>(
    State(state): State<AppState<B>>,
    headers: HeaderMap,
) -> Result<Json<HomePageResponse>, ApiError> {
    let base = state.media_base(&headers)?;
    let catalog = &state.catalog;

    Ok(Json(HomePageResponse {
        projects: render_rows(&catalog.projects.list().await, &base)?,
        clubactivity: render_rows(&catalog.club_activities.list().await, &base)?,
        achievements: render_plain(&catalog.achievements.list().await)?,
        fests: render_rows(&catalog.fests.list().await, &base)?,
    }))
}

/// `GET /api/notifications/all`
pub async fn all_notifications_handler<B: BlobStore + ?Sized>(
    State(state): State<AppState<B>>,
) -> Json<Vec<Stored<Notification>>> {
    Json(state.catalog.notifications_newest_first(false).await)
}

/// `GET /api/notifications/active`
pub async fn active_notifications_handler<B: BlobStore + ?Sized>(
    State(state): State<AppState<B>>,
) -> Json<Vec<Stored<Notification>>> {
    Json(state.catalog.notifications_newest_first(true).await)
}

/// Serve a stored blob.
///
/// `GET /media/{*path}`
///
/// # Headers
///
/// - `Content-Type` from the key extension
/// - `Cache-Control: public, max-age={cache_max_age}`
pub async fn media_handler<B: BlobStore + ?Sized>(
    State(state): State<AppState<B>>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    let data = state.store.get(&path).await?;

    let response = (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type_for(&path).to_string()),
            (
                header::CACHE_CONTROL,
                format!("public, max-age={}", state.cache_max_age),
            ),
        ],
        Body::from(data),
    )
        .into_response();

    Ok(response)
}

// =============================================================================
// Tests
// =============================================================================
