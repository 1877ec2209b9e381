//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                           - Home page (landing config + featured products)
//!
//! # Products
//! GET  /products                   - Product listing (filters via query string)
//! GET  /products/{id}              - Product detail
//!
//! # Cart (HTMX fragments, mutations that change the cart send HX-Trigger: cart-updated)
//! GET  /cart                       - Cart page
//! GET  /cart/sidebar               - Sidebar fragment
//! GET  /cart/count                 - Cart count badge fragment
//! POST /cart/add                   - ADD
//! POST /cart/update                - SET_QUANTITY (<= 0 removes)
//! POST /cart/remove                - REMOVE
//! POST /cart/toggle                - TOGGLE_OPEN
//! POST /cart/clear                 - CLEAR
//!
//! # Auth (rate limited)
//! GET  /auth/login                 - Login page
//! POST /auth/login                 - Login action
//! GET  /auth/register              - Register page
//! POST /auth/register              - Register action
//! POST /auth/logout                - Logout action
//!
//! # Account (requires auth)
//! GET  /account                    - Profile
//! POST /account/profile            - Update profile
//! GET  /account/orders             - Order history
//! GET  /account/subscriptions      - Subscriptions
//! POST /account/subscriptions      - Create subscription
//! POST /account/subscriptions/{id} - Change frequency, pause or resume
//! POST /account/subscriptions/{id}/cancel - Cancel subscription
//!
//! # Checkout (requires auth)
//! GET  /checkout                   - Summary
//! POST /checkout                   - Place order
//! POST /checkout/discount          - Apply discount code
//! POST /checkout/shipping          - Quote shipping
//! GET  /checkout/complete          - Confirmation
//!
//! # JSON API
//! POST /api/images/preload         - Warm image URLs
//! GET  /api/images/status          - Cache status of one URL
//! POST /api/images/clear           - Clear image cache (admin)
//! POST /api/catalog/refresh        - Drop cached catalog responses (admin)
//! ```

pub mod account;
pub mod api;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod home;
pub mod products;
pub mod subscriptions;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Router,
    http::StatusCode,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    routing::{get, post},
};

use crate::error::{Result, clear_sentry_user};
use crate::filters;
use crate::middleware::{LOGIN_PATH, PageContext, auth_rate_limiter, cart_rate_limiter};
use crate::services::SessionStore;
use crate::state::AppState;

// =============================================================================
// Shared templates
// =============================================================================

/// Inline alert fragment.
#[derive(Template, WebTemplate)]
#[template(path = "partials/alert.html")]
pub struct AlertTemplate {
    pub kind: &'static str,
    pub message: String,
}

impl AlertTemplate {
    #[must_use]
    pub const fn error(message: String) -> Self {
        Self {
            kind: "error",
            message,
        }
    }

    #[must_use]
    pub const fn success(message: String) -> Self {
        Self {
            kind: "success",
            message,
        }
    }
}

/// Render an alert into the page's flash region from an HTMX request.
#[must_use]
pub fn flash_error(message: String) -> Response {
    (
        AppendHeaders([("HX-Retarget", "#flash"), ("HX-Reswap", "innerHTML")]),
        AlertTemplate::error(message),
    )
        .into_response()
}

/// Full-page error (404, upstream failure).
#[derive(Template, WebTemplate)]
#[template(path = "error.html")]
pub struct ErrorPageTemplate {
    pub page: PageContext,
    pub title: String,
    pub message: String,
}

impl ErrorPageTemplate {
    /// Respond with a full error page.
    #[must_use]
    pub fn respond(page: PageContext, status: StatusCode, message: String) -> Response {
        let title = status
            .canonical_reason()
            .unwrap_or("Something went wrong")
            .to_string();
        (
            status,
            Self {
                page,
                title,
                message,
            },
        )
            .into_response()
    }

    #[must_use]
    pub fn not_found(page: PageContext) -> Response {
        Self::respond(
            page,
            StatusCode::NOT_FOUND,
            "We couldn't find the page you were looking for.".to_string(),
        )
    }
}

/// The API rejected the stored token: log out and send the visitor to the
/// login page, coming back to `next` afterwards.
///
/// # Errors
///
/// Returns an error if the session backend fails.
pub async fn session_expired(store: &SessionStore, next: &str) -> Result<Response> {
    tracing::info!("API token rejected, clearing session");
    store.clear().await?;
    clear_sentry_user();

    let next: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    Ok(Redirect::to(&format!("{LOGIN_PATH}?next={next}")).into_response())
}

/// Fallback for unknown paths.
pub async fn not_found(page: PageContext) -> Response {
    ErrorPageTemplate::not_found(page)
}

// =============================================================================
// Routers
// =============================================================================

/// Product routes.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Cart routes.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/sidebar", get(cart::sidebar))
        .route("/count", get(cart::count))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/toggle", post(cart::toggle))
        .route("/clear", post(cart::clear))
        .layer(cart_rate_limiter())
}

/// Auth routes.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", post(auth::logout))
        .layer(auth_rate_limiter())
}

/// Account routes.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::index))
        .route("/profile", post(account::update_profile))
        .route("/orders", get(account::orders))
        .route(
            "/subscriptions",
            get(subscriptions::index).post(subscriptions::create),
        )
        .route("/subscriptions/{id}", post(subscriptions::update))
        .route("/subscriptions/{id}/cancel", post(subscriptions::cancel))
}

/// Checkout routes.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show).post(checkout::place_order))
        .route("/discount", post(checkout::apply_discount))
        .route("/shipping", post(checkout::quote_shipping))
        .route("/complete", get(checkout::complete))
}

/// Image cache API routes.
pub fn image_api_routes() -> Router<AppState> {
    Router::new()
        .route("/preload", post(api::images::preload))
        .route("/status", get(api::images::status))
        .route("/clear", post(api::images::clear))
        .layer(cart_rate_limiter())
}

/// Catalog cache API routes.
pub fn catalog_api_routes() -> Router<AppState> {
    Router::new()
        .route("/refresh", post(api::catalog::refresh))
        .layer(cart_rate_limiter())
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/auth", auth_routes())
        .nest("/account", account_routes())
        .nest("/checkout", checkout_routes())
        .nest("/api/images", image_api_routes())
        .nest("/api/catalog", catalog_api_routes())
        .fallback(not_found)
}
