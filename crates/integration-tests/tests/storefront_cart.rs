//! Cart flow through the full router: add, count, update, clear.

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::StatusCode;
use serde_json::json;

use perfumeria_integration_tests::{
    body_text, form_request, mock_maintenance, mock_product, request, send, session_cookie,
    test_app,
};

#[tokio::test]
async fn test_add_to_cart_persists_in_session() {
    let api = wiremock::MockServer::start().await;
    mock_maintenance(&api, false).await;
    mock_product(
        &api,
        json!({ "id": "p1", "name": "Vetiver Intense", "price": "42.00", "stock": 3 }),
    )
    .await;
    let app = test_app(&api);

    let response = send(&app, form_request("/cart/add", "id=p1", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("HX-Trigger").unwrap(),
        "cart-updated"
    );
    let cookie = session_cookie(&response).expect("session cookie");
    assert!(body_text(response).await.contains(">1<"));

    // Adding again increments the same line.
    let response = send(&app, form_request("/cart/add", "id=p1", Some(&cookie))).await;
    assert!(body_text(response).await.contains(">2<"));

    let response = send(
        &app,
        request("GET", "/cart", Some(&cookie)).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Vetiver Intense"));
    assert!(html.contains("$84.00"));
}

#[tokio::test]
async fn test_quantity_zero_removes_line() {
    let api = wiremock::MockServer::start().await;
    mock_maintenance(&api, false).await;
    mock_product(
        &api,
        json!({ "id": "p2", "name": "Neroli", "price": 30, "stock": 10 }),
    )
    .await;
    let app = test_app(&api);

    let response = send(&app, form_request("/cart/add", "id=p2", None)).await;
    let cookie = session_cookie(&response).unwrap();

    let response = send(
        &app,
        form_request("/cart/update", "id=p2&quantity=0", Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!body_text(response).await.contains("Neroli"));

    let response = send(
        &app,
        request("GET", "/cart/count", Some(&cookie))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert!(!body_text(response).await.contains("badge"));
}

#[tokio::test]
async fn test_out_of_stock_product_is_rejected() {
    let api = wiremock::MockServer::start().await;
    mock_maintenance(&api, false).await;
    mock_product(
        &api,
        json!({ "id": "p3", "name": "Oud Noir", "price": "120.00", "stock": 0 }),
    )
    .await;
    let app = test_app(&api);

    let response = send(&app, form_request("/cart/add", "id=p3", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("HX-Retarget").unwrap(), "#flash");
    assert!(response.headers().get("HX-Trigger").is_none());
    assert!(body_text(response).await.contains("Oud Noir is out of stock."));
}

#[tokio::test]
async fn test_unknown_product_flashes_error() {
    let api = wiremock::MockServer::start().await;
    mock_maintenance(&api, false).await;
    let app = test_app(&api);

    let response = send(&app, form_request("/cart/add", "id=missing", None)).await;

    assert_eq!(response.headers().get("HX-Retarget").unwrap(), "#flash");
    assert!(response.headers().get("HX-Trigger").is_none());
}

#[tokio::test]
async fn test_removing_absent_line_does_not_notify() {
    let api = wiremock::MockServer::start().await;
    mock_maintenance(&api, false).await;
    let app = test_app(&api);

    let response = send(&app, form_request("/cart/remove", "id=p9", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("HX-Trigger").is_none());
}
