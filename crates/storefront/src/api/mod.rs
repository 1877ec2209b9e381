//! Client for the remote REST API.
//!
//! # Architecture
//!
//! - The API is the source of truth for products, orders, subscriptions,
//!   discounts, shipping quotes, users and landing/maintenance configuration.
//! - Every response uses the same envelope: `{ "data": ... }` on success,
//!   `{ "error": ..., "message": ... }` plus an HTTP status on failure.
//!   [`ApiClient`] is the only place that decodes it.
//! - Catalog and configuration responses are cached in memory via `moka`
//!   (5 minute TTL).
//!
//! Route handlers do not call these methods bare; they run them through a
//! [`Fetcher`](crate::fetch::Fetcher), which tracks loading/cancellation and
//! normalizes failures.
//!
//! # Example
//!
//! ```rust,ignore
//! let client = ApiClient::new(&config.api)?;
//! let fetcher = Fetcher::new();
//!
//! match fetcher.run(client.products()).await {
//!     FetchOutcome::Data(products) => render(products),
//!     FetchOutcome::Failed(err) => show_message(err.user_message()),
//!     FetchOutcome::Cancelled => {}
//! }
//! ```

mod cache;
pub mod types;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use perfumeria_core::{ProductId, SubscriptionId};

use crate::config::ApiConfig;
use crate::models::ApiToken;

pub use cache::{CacheKey, CacheValue};
pub use types::*;

const CACHE_TTL: Duration = Duration::from_secs(300);
const CACHE_CAPACITY: u64 = 1000;
const LOGGED_BODY_CHARS: usize = 500;

/// Errors that can occur when talking to the remote API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The API answered with a non-success status.
    #[error("API returned {status}: {}", describe_status_error(.error.as_ref(), .message.as_ref()))]
    Status {
        status: StatusCode,
        /// Machine-readable error code from the envelope.
        error: Option<String>,
        /// Human-readable message from the envelope.
        message: Option<String>,
        /// Raw response body (JSON, or a truncated string if not JSON).
        body: serde_json::Value,
    },

    /// HTTP request failed (connection, timeout, body read, request building).
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Success response did not match the expected envelope.
    #[error("JSON parse error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The configured base URL cannot be used to build request URLs.
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),
}

fn describe_status_error<'a>(error: Option<&'a String>, message: Option<&'a String>) -> &'a str {
    message
        .or(error)
        .map_or("no error details provided", String::as_str)
}

impl ApiError {
    /// HTTP status of a `Status` error.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the remote REST API.
///
/// Cheap to clone; all clones share the HTTP connection pool and cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    cache: Cache<CacheKey, CacheValue>,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be built.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let base_url =
            Url::parse(&config.base_url).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(config.base_url.clone()));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("perfumeria-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(CACHE_TTL)
            .support_invalidation_closures()
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url,
                cache,
            }),
        })
    }

    /// Build an endpoint URL from path segments (each segment is escaped).
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.inner.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn get(&self, segments: &[&str]) -> Result<RequestBuilder, ApiError> {
        Ok(self.inner.client.get(self.endpoint(segments)?))
    }

    fn post(&self, segments: &[&str]) -> Result<RequestBuilder, ApiError> {
        Ok(self.inner.client.post(self.endpoint(segments)?))
    }

    fn put(&self, segments: &[&str]) -> Result<RequestBuilder, ApiError> {
        Ok(self.inner.client.put(self.endpoint(segments)?))
    }

    fn delete(&self, segments: &[&str]) -> Result<RequestBuilder, ApiError> {
        Ok(self.inner.client.delete(self.endpoint(segments)?))
    }

    /// Send a request and unwrap the `data` field of the success envelope.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let text = self.execute(request).await?;

        serde_json::from_str::<DataEnvelope<T>>(&text)
            .map(|envelope| envelope.data)
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    body = %text.chars().take(LOGGED_BODY_CHARS).collect::<String>(),
                    "Failed to decode API response envelope"
                );
                ApiError::Decode(e)
            })
    }

    /// Send a request whose success body carries nothing we need.
    async fn send_empty(&self, request: RequestBuilder) -> Result<(), ApiError> {
        self.execute(request).await.map(|_| ())
    }

    /// Send a request and return the raw success body, or a `Status` error.
    async fn execute(&self, request: RequestBuilder) -> Result<String, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            return Ok(text);
        }

        let body = serde_json::from_str::<serde_json::Value>(&text).unwrap_or_else(|_| {
            serde_json::Value::String(text.chars().take(LOGGED_BODY_CHARS).collect())
        });
        let envelope = ErrorEnvelope::deserialize_lossy(&body);

        if status.is_server_error() {
            tracing::warn!(
                status = %status,
                error = ?envelope.error,
                message = ?envelope.message,
                "API returned server error"
            );
        } else {
            debug!(status = %status, error = ?envelope.error, "API returned client error");
        }

        Err(ApiError::Status {
            status,
            error: envelope.error,
            message: envelope.message,
            body,
        })
    }

    /// Serve from cache when possible, otherwise fetch and cache.
    async fn cached<T, Fut>(
        &self,
        key: CacheKey,
        unwrap: impl FnOnce(CacheValue) -> Option<T>,
        wrap: impl FnOnce(T) -> CacheValue,
        fetch: Fut,
    ) -> Result<T, ApiError>
    where
        T: Clone,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        if let Some(value) = self.inner.cache.get(&key).await.and_then(unwrap) {
            debug!(?key, "Cache hit");
            return Ok(value);
        }

        let value = fetch.await?;
        self.inner.cache.insert(key, wrap(value.clone())).await;
        Ok(value)
    }

    /// Drop cached catalog responses (products, categories, brands).
    pub fn invalidate_catalog(&self) {
        if let Err(e) = self
            .inner
            .cache
            .invalidate_entries_if(|key, _| key.is_catalog())
        {
            tracing::warn!(error = %e, "Failed to invalidate catalog cache");
        }
    }

    // =========================================================================
    // Auth & Users
    // =========================================================================

    /// Exchange credentials for a session token.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Status` with 401 for invalid credentials.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthPayload, ApiError> {
        let request = self
            .post(&["auth", "login"])?
            .json(&LoginRequest { email, password });
        self.send(request).await
    }

    /// Create an account and return its session token.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Status` with 409 when the email is taken.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthPayload, ApiError> {
        let request = self.post(&["auth", "register"])?.json(&RegisterRequest {
            name,
            email,
            password,
        });
        self.send(request).await
    }

    /// Fetch the user owning `token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is rejected or the request fails.
    #[instrument(skip_all)]
    pub async fn current_user(&self, token: &ApiToken) -> Result<ApiUser, ApiError> {
        let request = self.get(&["users", "me"])?.bearer_auth(token.expose());
        self.send(request).await
    }

    /// Update the profile of the user owning `token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the update is rejected or the request fails.
    #[instrument(skip(self, token))]
    pub async fn update_profile(
        &self,
        token: &ApiToken,
        update: &ProfileUpdate,
    ) -> Result<ApiUser, ApiError> {
        let request = self
            .put(&["users", "me"])?
            .bearer_auth(token.expose())
            .json(update);
        self.send(request).await
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// List all products (cached).
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn products(&self) -> Result<Vec<Product>, ApiError> {
        let fetch = async { self.send(self.get(&["products"])?).await };
        self.cached(
            CacheKey::Products,
            |v| match v {
                CacheValue::Products(p) => Some(p),
                _ => None,
            },
            CacheValue::Products,
            fetch,
        )
        .await
    }

    /// Get a single product (cached).
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Status` with 404 if the product does not exist.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn product(&self, id: &ProductId) -> Result<Product, ApiError> {
        let fetch = async { self.send(self.get(&["products", id.as_str()])?).await };
        self.cached(
            CacheKey::Product(id.clone()),
            |v| match v {
                CacheValue::Product(p) => Some(*p),
                _ => None,
            },
            |p| CacheValue::Product(Box::new(p)),
            fetch,
        )
        .await
    }

    /// List product categories (cached).
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        let fetch = async { self.send(self.get(&["categories"])?).await };
        self.cached(
            CacheKey::Categories,
            |v| match v {
                CacheValue::Categories(c) => Some(c),
                _ => None,
            },
            CacheValue::Categories,
            fetch,
        )
        .await
    }

    /// List product brands (cached).
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn brands(&self) -> Result<Vec<Brand>, ApiError> {
        let fetch = async { self.send(self.get(&["brands"])?).await };
        self.cached(
            CacheKey::Brands,
            |v| match v {
                CacheValue::Brands(b) => Some(b),
                _ => None,
            },
            CacheValue::Brands,
            fetch,
        )
        .await
    }

    // =========================================================================
    // Discounts & Shipping
    // =========================================================================

    /// Validate a discount code against a subtotal.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Status` (404/422) for unknown or expired codes.
    #[instrument(skip(self))]
    pub async fn validate_discount(
        &self,
        code: &str,
        subtotal: rust_decimal::Decimal,
    ) -> Result<Discount, ApiError> {
        let request = self
            .post(&["discounts", "validate"])?
            .json(&DiscountRequest { code, subtotal });
        self.send(request).await
    }

    /// Quote shipping for a set of items to a postal code.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination is not served or the request fails.
    #[instrument(skip(self, request), fields(postal_code = %request.postal_code))]
    pub async fn shipping_quote(
        &self,
        request: &ShippingQuoteRequest,
    ) -> Result<ShippingQuote, ApiError> {
        let request = self.post(&["shipping", "quote"])?.json(request);
        self.send(request).await
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// List the user's subscriptions.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is rejected or the request fails.
    #[instrument(skip_all)]
    pub async fn subscriptions(&self, token: &ApiToken) -> Result<Vec<Subscription>, ApiError> {
        let request = self.get(&["subscriptions"])?.bearer_auth(token.expose());
        self.send(request).await
    }

    /// Create a subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the subscription.
    #[instrument(skip(self, token))]
    pub async fn create_subscription(
        &self,
        token: &ApiToken,
        subscription: &NewSubscription,
    ) -> Result<Subscription, ApiError> {
        let request = self
            .post(&["subscriptions"])?
            .bearer_auth(token.expose())
            .json(subscription);
        self.send(request).await
    }

    /// Update a subscription's frequency or status.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription does not exist or the update is rejected.
    #[instrument(skip(self, token), fields(subscription_id = %id))]
    pub async fn update_subscription(
        &self,
        token: &ApiToken,
        id: &SubscriptionId,
        update: &SubscriptionUpdate,
    ) -> Result<Subscription, ApiError> {
        let request = self
            .put(&["subscriptions", id.as_str()])?
            .bearer_auth(token.expose())
            .json(update);
        self.send(request).await
    }

    /// Cancel a subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription does not exist or the request fails.
    #[instrument(skip(self, token), fields(subscription_id = %id))]
    pub async fn cancel_subscription(
        &self,
        token: &ApiToken,
        id: &SubscriptionId,
    ) -> Result<(), ApiError> {
        let request = self
            .delete(&["subscriptions", id.as_str()])?
            .bearer_auth(token.expose());
        self.send_empty(request).await
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Place an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the order.
    #[instrument(skip(self, token, order), fields(items = order.items.len()))]
    pub async fn create_order(&self, token: &ApiToken, order: &NewOrder) -> Result<Order, ApiError> {
        let request = self
            .post(&["orders"])?
            .bearer_auth(token.expose())
            .json(order);
        self.send(request).await
    }

    /// List the user's orders.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is rejected or the request fails.
    #[instrument(skip_all)]
    pub async fn orders(&self, token: &ApiToken) -> Result<Vec<Order>, ApiError> {
        let request = self.get(&["orders"])?.bearer_auth(token.expose());
        self.send(request).await
    }

    // =========================================================================
    // Remote configuration
    // =========================================================================

    /// Landing page content (cached).
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn landing_config(&self) -> Result<LandingConfig, ApiError> {
        let fetch = async { self.send(self.get(&["config", "landing"])?).await };
        self.cached(
            CacheKey::Landing,
            |v| match v {
                CacheValue::Landing(c) => Some(c),
                _ => None,
            },
            CacheValue::Landing,
            fetch,
        )
        .await
    }

    /// Maintenance-mode flag (cached).
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn maintenance_config(&self) -> Result<MaintenanceConfig, ApiError> {
        let fetch = async { self.send(self.get(&["config", "maintenance"])?).await };
        self.cached(
            CacheKey::Maintenance,
            |v| match v {
                CacheValue::Maintenance(c) => Some(c),
                _ => None,
            },
            CacheValue::Maintenance,
            fetch,
        )
        .await
    }
}

impl ErrorEnvelope {
    /// Extract `error`/`message` from any JSON body, ignoring shape mismatches.
    fn deserialize_lossy(body: &serde_json::Value) -> Self {
        let field = |name: &str| {
            body.get(name)
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned)
        };
        Self {
            error: field("error"),
            message: field("message"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::new(&ApiConfig {
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_joins_and_escapes_segments() {
        let client = ApiClient::new(&ApiConfig {
            base_url: "https://api.perfumeria.test/v1/".to_string(),
            timeout: Duration::from_secs(1),
        })
        .unwrap();

        let url = client.endpoint(&["products", "a/b c"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.perfumeria.test/v1/products/a%2Fb%20c"
        );
    }

    #[test]
    fn test_rejects_non_base_url() {
        let result = ApiClient::new(&ApiConfig {
            base_url: "mailto:ops@perfumeria.test".to_string(),
            timeout: Duration::from_secs(1),
        });
        assert!(matches!(result, Err(ApiError::InvalidUrl(_))));
    }

    #[test]
    fn test_status_error_display_prefers_message() {
        let err = ApiError::Status {
            status: StatusCode::UNAUTHORIZED,
            error: Some("invalid_credentials".to_string()),
            message: Some("Email or password is wrong".to_string()),
            body: json!({}),
        };
        assert_eq!(
            err.to_string(),
            "API returned 401 Unauthorized: Email or password is wrong"
        );
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    }

    #[tokio::test]
    async fn test_login_unwraps_data_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_json(json!({ "email": "ana@example.com", "password": "hunter22" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "token": "tok-123",
                    "user": { "id": 7, "name": "Ana", "email": "ana@example.com", "role": "admin" }
                }
            })))
            .mount(&server)
            .await;

        let payload = client_for(&server)
            .login("ana@example.com", "hunter22")
            .await
            .unwrap();

        assert_eq!(payload.token, "tok-123");
        assert_eq!(payload.user.id.as_str(), "7");
        assert!(payload.user.role.is_admin());
    }

    #[tokio::test]
    async fn test_error_envelope_becomes_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": "invalid_credentials",
                "message": "Invalid email or password"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .login("ana@example.com", "wrong")
            .await
            .unwrap_err();

        match err {
            ApiError::Status {
                status,
                error,
                message,
                ..
            } => {
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert_eq!(error.as_deref(), Some("invalid_credentials"));
                assert_eq!(message.as_deref(), Some("Invalid email or password"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_json_error_body_is_kept_as_string() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let err = client_for(&server).products().await.unwrap_err();
        match err {
            ApiError::Status { status, body, .. } => {
                assert_eq!(status, StatusCode::BAD_GATEWAY);
                assert_eq!(body, json!("Bad Gateway"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_envelope_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/brands"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1 }])))
            .mount(&server)
            .await;

        let err = client_for(&server).brands().await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn test_products_are_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "id": "p1", "name": "Ambar", "price": 50 }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let first = client.products().await.unwrap();
        let second = client.products().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_catalog_forces_refetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "id": "p1", "name": "Ambar", "price": 50 }]
            })))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.products().await.unwrap();
        client.invalidate_catalog();
        client.products().await.unwrap();
    }

    #[tokio::test]
    async fn test_authenticated_calls_send_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/subscriptions"))
            .and(header("authorization", "Bearer tok-abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let subs = client_for(&server)
            .subscriptions(&ApiToken::new("tok-abc"))
            .await
            .unwrap();
        assert!(subs.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_subscription_accepts_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/subscriptions/s-1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        client_for(&server)
            .cancel_subscription(&ApiToken::new("tok"), &SubscriptionId::new("s-1"))
            .await
            .unwrap();
    }
}
