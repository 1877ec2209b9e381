//! Integration tests for Perfumeria.
//!
//! The storefront router is driven in-process with `tower::ServiceExt`,
//! against a `wiremock` server standing in for the remote API. Sessions use
//! the in-memory store and the database pool never connects, so no services
//! need to be running.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p perfumeria-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use secrecy::SecretString;
use serde_json::{Value, json};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use tower_sessions::{MemoryStore, SessionManagerLayer};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use perfumeria_storefront::config::{ApiConfig, StorefrontConfig};
use perfumeria_storefront::state::AppState;

/// Client address sent with every request; the rate limiters key on it.
pub const CLIENT_IP: &str = "203.0.113.7";

/// Storefront configuration pointing at `api_url`.
#[must_use]
pub fn test_config(api_url: &str) -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://localhost/perfumeria_test"),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 3000,
        base_url: "http://localhost:3000".to_string(),
        session_secret: SecretString::from("k3J9xq2LmP7vR4tY8wZ1nB6cF0hD5gA2sE9uI3oQ7jX"),
        store_name: "Perfumeria".to_string(),
        api: ApiConfig {
            base_url: api_url.to_string(),
            timeout: Duration::from_secs(5),
        },
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// Full storefront router backed by `api`.
pub fn test_app(api: &MockServer) -> Router {
    let config = test_config(&api.uri());
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://localhost/perfumeria_test")
        .unwrap();
    let state = AppState::new(config, pool).unwrap();
    let sessions = SessionManagerLayer::new(MemoryStore::default()).with_secure(false);

    perfumeria_storefront::app(state, sessions)
}

/// Wrap `data` in the API's success envelope.
#[must_use]
pub fn envelope(data: Value) -> Value {
    json!({ "data": data })
}

/// Mock the maintenance flag.
pub async fn mock_maintenance(api: &MockServer, enabled: bool) {
    Mock::given(method("GET"))
        .and(path("/config/maintenance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "enabled": enabled,
            "message": "Back at noon."
        }))))
        .mount(api)
        .await;
}

/// Mock `GET /products/{id}`.
pub async fn mock_product(api: &MockServer, product: Value) {
    let id = product["id"].as_str().unwrap().to_string();
    Mock::given(method("GET"))
        .and(path(format!("/products/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(product)))
        .mount(api)
        .await;
}

/// Build a request carrying the client address and, optionally, a cookie.
#[must_use]
pub fn request(method: &str, uri: &str, cookie: Option<&str>) -> axum::http::request::Builder {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", CLIENT_IP);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder
}

/// `POST` a URL-encoded form.
#[must_use]
pub fn form_request(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    request("POST", uri, cookie)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header("hx-request", "true")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Send one request through the router.
pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

/// The `name=value` part of the response's session cookie.
#[must_use]
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| value.split(';').next().map(str::to_string))
}

/// Read the whole response body as text.
pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
