//! Image cache endpoints.
//!
//! Preloading is limited to images of catalog products. Any other URL is
//! reported as refused and never fetched.

use std::collections::HashSet;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::api::Product;
use crate::error::add_breadcrumb;
use crate::fetch::{FetchOutcome, Fetcher};
use crate::middleware::RequireAdmin;
use crate::services::ImageCacheEntry;
use crate::state::AppState;

/// URLs accepted by one preload request; the rest are ignored.
pub const MAX_PRELOAD_URLS: usize = 50;

const NOT_A_CATALOG_IMAGE: &str = "not a catalog image";

#[derive(Debug, Deserialize)]
pub struct PreloadRequest {
    pub urls: Vec<String>,
}

/// Outcome of one URL in a preload request.
#[derive(Debug, Serialize)]
pub struct PreloadResult {
    pub url: String,
    pub loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PreloadResponse {
    pub results: Vec<PreloadResult>,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub url: String,
    pub cached: bool,
    /// Load time, milliseconds since the Unix epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded_at: Option<i64>,
}

/// Drop duplicates (keeping first occurrences) and cap the list.
fn dedup_urls(urls: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    urls.into_iter()
        .filter(|url| !url.is_empty() && seen.insert(url.clone()))
        .take(MAX_PRELOAD_URLS)
        .collect()
}

/// Every image URL of the catalog.
fn catalog_images(products: &[Product]) -> HashSet<&str> {
    products
        .iter()
        .flat_map(|p| p.images.iter().map(String::as_str))
        .collect()
}

/// Preload a batch of catalog image URLs and report each outcome.
#[instrument(skip(state, request), fields(urls = request.urls.len()))]
pub async fn preload(
    State(state): State<AppState>,
    Json(request): Json<PreloadRequest>,
) -> Response {
    let fetcher = Fetcher::new();
    let products = match fetcher.run(state.api().products()).await {
        FetchOutcome::Data(products) => products,
        FetchOutcome::Failed(e) => {
            tracing::warn!(error = %e, "Catalog unavailable, refusing image preload");
            return StatusCode::BAD_GATEWAY.into_response();
        }
        FetchOutcome::Cancelled => return StatusCode::NO_CONTENT.into_response(),
    };
    let allowed = catalog_images(&products);

    let (urls, refused): (Vec<String>, Vec<String>) = dedup_urls(request.urls)
        .into_iter()
        .partition(|url| allowed.contains(url.as_str()));
    if !refused.is_empty() {
        tracing::debug!(count = refused.len(), "Refused non-catalog image URLs");
    }

    let images = state.images();
    let outcomes = join_all(urls.iter().map(|url| images.preload(url))).await;

    let results = urls
        .into_iter()
        .zip(outcomes)
        .map(|(url, outcome)| match outcome {
            Ok(_) => PreloadResult {
                url,
                loaded: true,
                error: None,
            },
            Err(e) => PreloadResult {
                url,
                loaded: false,
                error: Some(e.to_string()),
            },
        })
        .chain(refused.into_iter().map(|url| PreloadResult {
            url,
            loaded: false,
            error: Some(NOT_A_CATALOG_IMAGE.to_string()),
        }))
        .collect();

    Json(PreloadResponse { results }).into_response()
}

/// Report whether one URL is cached.
#[instrument(skip(state))]
pub async fn status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Json<StatusResponse> {
    let entry: Option<ImageCacheEntry> = state.images().entry(&query.url);

    Json(StatusResponse {
        cached: entry.as_ref().is_some_and(|e| e.loaded),
        loaded_at: entry.map(|e| e.timestamp),
        url: query.url,
    })
}

/// Clear the image cache. Admin only.
#[instrument(skip_all, fields(user_id = %auth.user.id))]
pub async fn clear(State(state): State<AppState>, RequireAdmin(auth): RequireAdmin) -> StatusCode {
    state.images().clear_cache();
    tracing::info!("Image cache cleared by admin");
    add_breadcrumb("admin", "Cleared image cache", &[("user_id", auth.user.id.as_str())]);
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use perfumeria_core::ProductId;

    use super::*;

    fn product(id: &str, images: &[&str]) -> Product {
        Product {
            id: ProductId::new(id),
            name: id.to_string(),
            description: None,
            price: Decimal::new(5000, 2),
            images: images.iter().map(ToString::to_string).collect(),
            category: None,
            brand: None,
            stock: None,
            featured: false,
        }
    }

    #[test]
    fn test_catalog_images_collects_every_product_image() {
        let products = vec![
            product("p1", &["https://cdn.example.com/a.jpg", "https://cdn.example.com/b.jpg"]),
            product("p2", &[]),
            product("p3", &["https://cdn.example.com/c.jpg"]),
        ];
        let allowed = catalog_images(&products);

        assert_eq!(allowed.len(), 3);
        assert!(allowed.contains("https://cdn.example.com/c.jpg"));
        assert!(!allowed.contains("http://127.0.0.1/internal"));
    }

    #[test]
    fn test_dedup_keeps_order_and_caps() {
        let urls = vec![
            "https://cdn.example.com/a.jpg".to_string(),
            String::new(),
            "https://cdn.example.com/b.jpg".to_string(),
            "https://cdn.example.com/a.jpg".to_string(),
        ];
        assert_eq!(
            dedup_urls(urls),
            vec![
                "https://cdn.example.com/a.jpg".to_string(),
                "https://cdn.example.com/b.jpg".to_string(),
            ]
        );

        let many: Vec<String> = (0..80).map(|i| format!("https://cdn.example.com/{i}.jpg")).collect();
        assert_eq!(dedup_urls(many).len(), MAX_PRELOAD_URLS);
    }
}
