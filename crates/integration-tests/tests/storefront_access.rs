//! Health, maintenance mode and authentication gates.

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{StatusCode, header};

use perfumeria_integration_tests::{body_text, mock_maintenance, request, send, test_app};

fn get(uri: &str) -> axum::http::Request<Body> {
    request("GET", uri, None).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_does_not_touch_dependencies() {
    let api = wiremock::MockServer::start().await;
    let app = test_app(&api);

    let response = send(&app, get("/health")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");
}

#[tokio::test]
async fn test_maintenance_mode_blocks_visitors() {
    let api = wiremock::MockServer::start().await;
    mock_maintenance(&api, true).await;
    let app = test_app(&api);

    let response = send(&app, get("/cart")).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "300");
    assert!(body_text(response).await.contains("Back at noon."));
}

#[tokio::test]
async fn test_maintenance_mode_keeps_login_reachable() {
    let api = wiremock::MockServer::start().await;
    mock_maintenance(&api, true).await;
    let app = test_app(&api);

    let response = send(&app, get("/auth/login")).await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unreachable_maintenance_flag_serves_normally() {
    // No mocks mounted: the flag lookup gets a 404.
    let api = wiremock::MockServer::start().await;
    let app = test_app(&api);

    let response = send(&app, get("/cart")).await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_account_redirects_anonymous_visitors_to_login() {
    let api = wiremock::MockServer::start().await;
    mock_maintenance(&api, false).await;
    let app = test_app(&api);

    let response = send(&app, get("/account/orders")).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/auth/login?next=%2Faccount%2Forders"
    );
}

#[tokio::test]
async fn test_unknown_path_renders_not_found_page() {
    let api = wiremock::MockServer::start().await;
    mock_maintenance(&api, false).await;
    let app = test_app(&api);

    let response = send(&app, get("/no-such-page")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_security_headers_are_set() {
    let api = wiremock::MockServer::start().await;
    mock_maintenance(&api, false).await;
    let app = test_app(&api);

    let response = send(&app, get("/cart")).await;

    assert!(response.headers().contains_key("content-security-policy"));
    assert!(response.headers().contains_key("x-request-id"));
}
