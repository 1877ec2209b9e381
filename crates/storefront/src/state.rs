//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::api::{ApiClient, ApiError};
use crate::config::StorefrontConfig;
use crate::services::{ImageCache, MemoryStorage};

/// Timeout for image preload requests.
const IMAGE_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    api: ApiClient,
    images: ImageCache,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the API base URL is invalid or an HTTP client
    /// cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config.api)?;

        let image_client = reqwest::Client::builder()
            .timeout(IMAGE_FETCH_TIMEOUT)
            .build()?;
        let images = ImageCache::new(image_client, Arc::new(MemoryStorage::new()));

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                api,
                images,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// `PostgreSQL` pool (session store and readiness checks).
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Remote API client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Product image preloader.
    #[must_use]
    pub fn images(&self) -> &ImageCache {
        &self.inner.images
    }
}
