//! HTTP server layer.
//!
//! Read-only JSON API over the record catalog, plus media serving for the
//! normalized images.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │          GET /api/...            GET /media/{*path}             │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │           routes            │  │
//! │  │ (render + error mapping) │  │ (router config, CORS, trace)│  │
//! │  └────────────┬─────────────┘  └─────────────────────────────┘  │
//! └───────────────┼─────────────────────────────────────────────────┘
//!                 ▼
//!         Catalog + BlobStore
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    content_type_for, image_url, render_image_record, ApiError, AppState, ErrorResponse,
    HealthResponse, HomePageResponse, MEDIA_PATH,
};
pub use routes::{create_router, RouterConfig};
