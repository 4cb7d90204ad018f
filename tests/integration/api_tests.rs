//! Public API integration tests.
//!
//! Tests verify:
//! - JSON listings with absolute image URLs
//! - Per-series event fields and the homepage bundle
//! - Notification filtering and ordering
//! - Media serving headers and error responses

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use url::Url;

use stac_media::{
    create_router, Achievement, Alumni, Catalog, Event, EventKind, MemoryBlobStore, Notification,
    Project, RouterConfig,
};

use super::test_utils::create_png;

async fn seeded_catalog() -> Catalog {
    let catalog = Catalog::new();

    let alumni: Alumni = serde_json::from_value(serde_json::json!({
        "name": "Asha",
        "email": "asha@example.com",
        "message": "Keep looking up",
        "linkedin_url": "https://linkedin.com/in/asha",
        "instagram_url": "",
        "image": "images/Alumni/asha.webp",
    }))
    .unwrap();
    catalog.alumni.insert(alumni).await.unwrap();

    for kind in [EventKind::Astrax, EventKind::Zenith] {
        catalog
            .events(kind)
            .insert(Event {
                kind,
                name: format!("{} 2025", kind.as_str()),
                image: "default.webp".to_string(),
                description: Some("Night sky quiz".to_string()),
                problem_statement: "Find the brightest star".to_string(),
            })
            .await
            .unwrap();
    }

    catalog
        .projects
        .insert(Project {
            topic: "Radio telescope".to_string(),
            description: "A backyard dish".to_string(),
            image: "images/HomePage/projects/dish.webp".to_string(),
        })
        .await
        .unwrap();
    catalog
        .achievements
        .insert(Achievement {
            achievement: "Inter-college quiz winners".to_string(),
            link: String::new(),
        })
        .await
        .unwrap();

    let now = Utc::now();
    let mut old = Notification::new("Old", "Registration closed");
    old.timestamp = now - Duration::days(2);
    let mut hidden = Notification::new("Hidden", "Draft");
    hidden.is_active = false;
    hidden.timestamp = now - Duration::days(1);
    let mut fresh = Notification::new("Fresh", "Star party tonight");
    fresh.timestamp = now;
    for notification in [old, hidden, fresh] {
        catalog.notifications.insert(notification).await.unwrap();
    }

    catalog
}

async fn router_with(config: RouterConfig) -> Router {
    let store = MemoryBlobStore::new().with_blob("images/Alumni/asha.webp", create_png(4, 4));
    create_router(
        Arc::new(seeded_catalog().await),
        Arc::new(store),
        config.with_tracing(false),
    )
}

async fn get(router: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, bytes::Bytes) {
    let request = Request::builder()
        .uri(uri)
        .header("host", "stac.test")
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body)
}

async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
    let (status, _, body) = get(router, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

// =============================================================================
// Listings
// =============================================================================

#[tokio::test]
async fn test_health() {
    let router = router_with(RouterConfig::new()).await;
    let (status, json) = get_json(router, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["storage"], "memory://");
}

#[tokio::test]
async fn test_alumni_image_url_from_host() {
    let router = router_with(RouterConfig::new()).await;
    let (status, json) = get_json(router, "/api/alumni").await;

    assert_eq!(status, StatusCode::OK);
    let rows = json.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "Asha");
    assert_eq!(
        rows[0]["image"],
        "http://stac.test/media/images/Alumni/asha.webp"
    );
}

#[tokio::test]
async fn test_configured_media_base_url() {
    let config = RouterConfig::new()
        .with_media_base_url(Some(Url::parse("https://cdn.example.com/stac").unwrap()));
    let router = router_with(config).await;
    let (_, json) = get_json(router, "/api/alumni").await;

    assert_eq!(
        json[0]["image"],
        "https://cdn.example.com/stac/images/Alumni/asha.webp"
    );
}

#[tokio::test]
async fn test_event_series_fields() {
    let router = router_with(RouterConfig::new()).await;

    let (status, astrax) = get_json(router.clone(), "/api/events/astrax").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(astrax[0]["name"], "astrax 2025");
    assert_eq!(astrax[0]["image"], "http://stac.test/media/default.webp");
    assert!(astrax[0].get("problem_statement").is_none());
    assert!(astrax[0].get("kind").is_none());

    let (_, zenith) = get_json(router.clone(), "/api/events/zenith").await;
    assert_eq!(zenith[0]["problem_statement"], "Find the brightest star");

    let (_, pleiades) = get_json(router, "/api/events/pleiades").await;
    assert_eq!(pleiades, serde_json::json!([]));
}

#[tokio::test]
async fn test_unknown_event_series_is_not_found() {
    let router = router_with(RouterConfig::new()).await;
    let (status, json) = get_json(router, "/api/events/solstice").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
    assert_eq!(json["status"], 404);
}

#[tokio::test]
async fn test_homepage_sections() {
    let router = router_with(RouterConfig::new()).await;
    let (status, json) = get_json(router, "/api/homepage").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json["projects"][0]["image_url"],
        "http://stac.test/media/images/HomePage/projects/dish.webp"
    );
    assert!(json["projects"][0].get("image").is_none());
    assert_eq!(
        json["achievements"][0]["achievement"],
        "Inter-college quiz winners"
    );
    assert_eq!(json["clubactivity"], serde_json::json!([]));
    assert_eq!(json["fests"], serde_json::json!([]));
}

#[tokio::test]
async fn test_notifications_newest_first() {
    let router = router_with(RouterConfig::new()).await;

    let (_, all) = get_json(router.clone(), "/api/notifications/all").await;
    let titles: Vec<_> = all
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["title"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(titles, vec!["Fresh", "Hidden", "Old"]);

    let (_, active) = get_json(router, "/api/notifications/active").await;
    let titles: Vec<_> = active
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["title"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(titles, vec!["Fresh", "Old"]);
}

// =============================================================================
// Media
// =============================================================================

#[tokio::test]
async fn test_media_served_with_headers() {
    let config = RouterConfig::new().with_cache_max_age(600);
    let router = router_with(config).await;
    let (status, headers, body) = get(router, "/media/images/Alumni/asha.webp").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("content-type").unwrap(), "image/webp");
    assert_eq!(headers.get("cache-control").unwrap(), "public, max-age=600");
    assert_eq!(&body[..], &create_png(4, 4)[..]);
}

#[tokio::test]
async fn test_missing_media_is_not_found() {
    let router = router_with(RouterConfig::new()).await;
    let (status, json) = get_json(router, "/media/images/Alumni/nobody.webp").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_missing_host_without_base_url() {
    let router = router_with(RouterConfig::new()).await;
    let request = Request::builder()
        .uri("/api/alumni")
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
