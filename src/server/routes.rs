//! Router configuration for the public API.
//!
//! # Route Structure
//!
//! ```text
//! /health                          - Health check
//! /api/alumni                      - Alumni
//! /api/coreteam                    - Core team
//! /api/events/{kind}               - Event series
//! /api/photogallery                - Photo gallery
//! /api/videogallery                - Video gallery
//! /api/homepage                    - Homepage sections
//! /api/notifications/all           - All notifications
//! /api/notifications/active        - Active notifications
//! /media/{*path}                   - Image blobs
//! ```
//!
//! # Example
//!
//! ```ignore
//! use stac_media::server::{create_router, RouterConfig};
//!
//! let config = RouterConfig::new()
//!     .with_media_base_url(Some("https://stac.example.com/media/".parse()?))
//!     .with_cors_origins(vec!["https://stac.example.com".to_string()]);
//!
//! let router = create_router(catalog, store, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use url::Url;

use super::handlers::{
    active_notifications_handler, all_notifications_handler, alumni_handler, core_team_handler,
    events_handler, health_handler, homepage_handler, media_handler, photo_gallery_handler,
    video_gallery_handler, AppState,
};
use crate::records::Catalog;
use crate::storage::BlobStore;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Base URL for image links (None = derive from the request Host header)
    pub media_base_url: Option<Url>,

    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age for media responses, in seconds
    pub cache_max_age: u32,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Create a router configuration.
    ///
    /// By default:
    /// - Image URLs are built from the request Host header
    /// - CORS allows any origin
    /// - Media cache max-age is 1 hour (3600 seconds)
    /// - Tracing is enabled
    pub fn new() -> Self {
        Self {
            media_base_url: None,
            cors_origins: None,
            cache_max_age: 3600,
            enable_tracing: true,
        }
    }

    /// Set a fixed base URL for image links.
    ///
    /// A trailing `/` is added if missing so that keys join beneath it.
    pub fn with_media_base_url(mut self, url: Option<Url>) -> Self {
        self.media_base_url = url.map(|mut url| {
            if !url.path().ends_with('/') {
                let path = format!("{}/", url.path());
                url.set_path(&path);
            }
            url
        });
        self
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Set the media Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the application router.
pub fn create_router<B>(catalog: Arc<Catalog>, store: Arc<B>, config: RouterConfig) -> Router
where
    B: BlobStore + ?Sized + 'static,
{
    let app_state = AppState::new(catalog, store)
        .with_media_base_url(config.media_base_url.clone())
        .with_cache_max_age(config.cache_max_age);

    let cors = build_cors_layer(&config);

    let api_routes = Router::new()
        .route("/alumni", get(alumni_handler::<B>))
        .route("/coreteam", get(core_team_handler::<B>))
        .route("/events/{kind}", get(events_handler::<B>))
        .route("/photogallery", get(photo_gallery_handler::<B>))
        .route("/videogallery", get(video_gallery_handler::<B>))
        .route("/homepage", get(homepage_handler::<B>))
        .route("/notifications/all", get(all_notifications_handler::<B>))
        .route("/notifications/active", get(active_notifications_handler::<B>));

    let router = Router::new()
        .route("/health", get(health_handler::<B>))
        .route("/media/{*path}", get(media_handler::<B>))
        .nest("/api", api_routes)
        .with_state(app_state)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
