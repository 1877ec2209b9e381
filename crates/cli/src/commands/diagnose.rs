//! Configuration and connectivity checks.

use std::sync::Arc;
use std::time::Duration;

use perfumeria_storefront::api::ApiClient;
use perfumeria_storefront::config::{ApiConfig, StorefrontConfig};
use perfumeria_storefront::fetch::{FetchOutcome, Fetcher};
use perfumeria_storefront::services::{ImageCache, MemoryStorage};
use tokio::task::JoinHandle;

/// How long an API call runs before the user is told it is still pending.
const SLOW_API_NOTICE: Duration = Duration::from_secs(2);

/// Log a notice if `fetcher` is still loading after [`SLOW_API_NOTICE`].
///
/// Abort the returned handle once the call finishes.
fn notify_if_slow(fetcher: &Fetcher) -> JoinHandle<()> {
    let loading = fetcher.loading();
    tokio::spawn(async move {
        tokio::time::sleep(SLOW_API_NOTICE).await;
        if *loading.borrow() {
            tracing::info!("Still waiting for the API...");
        }
    })
}

/// Load the full storefront configuration and log a summary.
///
/// # Errors
///
/// Returns the first configuration problem found.
pub fn check_config() -> Result<(), Box<dyn std::error::Error>> {
    let config = StorefrontConfig::from_env()?;

    tracing::info!(
        addr = %config.socket_addr(),
        base_url = %config.base_url,
        api = %config.api.base_url,
        api_timeout_secs = config.api.timeout.as_secs(),
        secure_cookies = config.is_secure(),
        sentry = config.sentry_dsn.is_some(),
        "Configuration OK"
    );
    Ok(())
}

/// Fetch the maintenance flag to prove the API is reachable.
///
/// # Errors
///
/// Returns an error if the API cannot be reached or answers with an error.
pub async fn ping_api() -> Result<(), Box<dyn std::error::Error>> {
    let api = ApiClient::new(&ApiConfig::from_env()?)?;
    let fetcher = Fetcher::new();
    let notice = notify_if_slow(&fetcher);
    let outcome = fetcher.run(api.maintenance_config()).await;
    notice.abort();

    match outcome {
        FetchOutcome::Data(config) => {
            tracing::info!(maintenance = config.enabled, "API reachable");
            Ok(())
        }
        FetchOutcome::Failed(e) => Err(e.into()),
        FetchOutcome::Cancelled => Err("request cancelled".into()),
    }
}

/// Preload up to `limit` product images and report how many failed.
///
/// # Errors
///
/// Returns an error if the product list cannot be fetched.
pub async fn preload_images(limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let api = ApiClient::new(&ApiConfig::from_env()?)?;
    let fetcher = Fetcher::new();
    let notice = notify_if_slow(&fetcher);
    let outcome = fetcher.run(api.products()).await;
    notice.abort();

    let products = match outcome {
        FetchOutcome::Data(products) => products,
        FetchOutcome::Failed(e) => return Err(e.into()),
        FetchOutcome::Cancelled => return Err("request cancelled".into()),
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    let images = ImageCache::new(client, Arc::new(MemoryStorage::new()));

    let urls: Vec<&String> = products
        .iter()
        .flat_map(|p| p.images.iter())
        .take(limit)
        .collect();

    let mut failed = 0usize;
    for url in &urls {
        if let Err(e) = images.preload(url).await {
            failed += 1;
            tracing::warn!(url = %url, error = %e, "Image failed to load");
        }
    }

    tracing::info!(total = urls.len(), failed, "Image preload finished");
    Ok(())
}

