//! Product image preloading.
//!
//! Warms product images so pages can render them eagerly. Concurrent
//! preloads of the same URL share a single HTTP request, failures are never
//! cached, and successful loads are recorded in a metadata table kept in
//! [`SessionStorage`] under [`METADATA_KEY`].
//!
//! Only `http` and `https` URLs are fetched. Callers decide which URLs are
//! worth warming; the preload endpoint restricts them to catalog images.
//!
//! A load that is still in flight when [`ImageCache::clear_cache`] runs is
//! discarded rather than recorded.
//!
//! Metadata expires [`IMAGE_CACHE_TTL`] after the load. Expired entries are
//! ignored when read and pruned on the next write; nothing sweeps them in
//! the background.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

use super::storage::SessionStorage;

/// How long a loaded image counts as cached.
pub const IMAGE_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Storage key of the metadata table.
pub const METADATA_KEY: &str = "image_cache_metadata";

const MAX_TRACKED_URLS: u64 = 10_000;

/// Errors from loading an image.
#[derive(Debug, Error)]
pub enum ImageCacheError {
    #[error("invalid image URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported image URL scheme: {url}")]
    UnsupportedScheme { url: String },

    #[error("image cache was cleared while {url} was loading")]
    Cleared { url: String },

    #[error("image request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("image {url} returned {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}

/// Metadata recorded for a loaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCacheEntry {
    pub url: String,
    /// Load time, milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub loaded: bool,
}

impl ImageCacheEntry {
    fn is_expired(&self, now_ms: i64) -> bool {
        let ttl_ms = i64::try_from(IMAGE_CACHE_TTL.as_millis()).unwrap_or(i64::MAX);
        now_ms.saturating_sub(self.timestamp) > ttl_ms
    }
}

type Metadata = HashMap<String, ImageCacheEntry>;

/// Image preloader with request coalescing and expiring metadata.
///
/// Cheap to clone.
#[derive(Clone)]
pub struct ImageCache {
    inner: Arc<ImageCacheInner>,
}

struct ImageCacheInner {
    client: reqwest::Client,
    /// In-flight and resolved loads, keyed by URL.
    loads: Cache<String, String>,
    storage: Arc<dyn SessionStorage>,
    /// Serializes read-modify-write cycles on the metadata table.
    write_lock: Mutex<()>,
    /// Bumped by every clear; loads started before a clear are not recorded.
    generation: AtomicU64,
}

impl ImageCache {
    #[must_use]
    pub fn new(client: reqwest::Client, storage: Arc<dyn SessionStorage>) -> Self {
        let loads = Cache::builder()
            .max_capacity(MAX_TRACKED_URLS)
            .time_to_live(IMAGE_CACHE_TTL)
            .build();

        Self {
            inner: Arc::new(ImageCacheInner {
                client,
                loads,
                storage,
                write_lock: Mutex::new(()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Load `url` once, resolving to the URL itself.
    ///
    /// Callers racing on the same URL share the first caller's request. A
    /// failed load is handed to every waiting caller and then forgotten, so
    /// the next call tries again.
    ///
    /// # Errors
    ///
    /// Returns the shared load error.
    #[instrument(skip(self))]
    pub async fn preload(&self, url: &str) -> Result<String, Arc<ImageCacheError>> {
        let generation = self.inner.generation.load(Ordering::Acquire);
        self.inner
            .loads
            .try_get_with(url.to_owned(), self.load(url, generation))
            .await
    }

    /// Whether `url` was loaded within the last hour.
    #[must_use]
    pub fn is_cached(&self, url: &str) -> bool {
        self.entry(url).is_some_and(|entry| entry.loaded)
    }

    /// Unexpired metadata for `url`.
    #[must_use]
    pub fn entry(&self, url: &str) -> Option<ImageCacheEntry> {
        self.read_metadata().remove(url)
    }

    /// Forget every load and delete the metadata table.
    pub fn clear_cache(&self) {
        let _guard = self
            .inner
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        self.inner.loads.invalidate_all();
        self.inner.storage.remove(METADATA_KEY);
        debug!("Image cache cleared");
    }

    /// Preload `urls` in the background, skipping ones already cached.
    pub fn spawn_preload(&self, urls: Vec<String>) {
        let pending: Vec<String> = urls
            .into_iter()
            .filter(|url| !self.is_cached(url))
            .collect();
        if pending.is_empty() {
            return;
        }

        let cache = self.clone();
        tokio::spawn(async move {
            let loads = pending.iter().map(|url| cache.preload(url));
            for (url, result) in pending.iter().zip(futures::future::join_all(loads).await) {
                if let Err(e) = result {
                    debug!(url = %url, error = %e, "Background image preload failed");
                }
            }
        });
    }

    async fn load(&self, url: &str, generation: u64) -> Result<String, ImageCacheError> {
        let parsed = Url::parse(url).map_err(|source| ImageCacheError::InvalidUrl {
            url: url.to_owned(),
            source,
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ImageCacheError::UnsupportedScheme {
                url: url.to_owned(),
            });
        }

        let response = self.inner.client.get(parsed).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImageCacheError::Status {
                url: url.to_owned(),
                status,
            });
        }
        let bytes = response.bytes().await?;

        debug!(url = %url, size = bytes.len(), "Image loaded");
        // An error keeps the stale value out of the load map as well.
        if !self.record(url, generation) {
            return Err(ImageCacheError::Cleared {
                url: url.to_owned(),
            });
        }
        Ok(url.to_owned())
    }

    /// Add `url` to the metadata table. Returns `false` without writing if
    /// the cache was cleared after the load started.
    fn record(&self, url: &str, generation: u64) -> bool {
        let _guard = self
            .inner
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if self.inner.generation.load(Ordering::Acquire) != generation {
            debug!(url = %url, "Discarding image load that finished after a clear");
            return false;
        }

        let mut metadata = self.read_metadata();
        metadata.insert(
            url.to_owned(),
            ImageCacheEntry {
                url: url.to_owned(),
                timestamp: Utc::now().timestamp_millis(),
                loaded: true,
            },
        );

        match serde_json::to_string(&metadata) {
            Ok(json) => self.inner.storage.set(METADATA_KEY, json),
            Err(e) => warn!(error = %e, "Failed to serialize image cache metadata"),
        }
        true
    }

    /// Read the metadata table, leaving out expired entries.
    fn read_metadata(&self) -> Metadata {
        let Some(raw) = self.inner.storage.get(METADATA_KEY) else {
            return Metadata::new();
        };

        let mut metadata: Metadata = serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "Discarding unreadable image cache metadata");
            Metadata::new()
        });

        let now = Utc::now().timestamp_millis();
        metadata.retain(|_, entry| !entry.is_expired(now));
        metadata
    }
}
