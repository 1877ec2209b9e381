//! Checkout route handlers.
//!
//! The cart, discount and shipping quote live in the session until the order
//! is placed. Discount and shipping updates are HTMX requests that swap the
//! summary fragment.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use perfumeria_core::{CartIntent, OrderId, format_money};

use super::cart::CartView;
use super::{flash_error, session_expired};
use crate::api::{NewOrder, ShippingQuoteRequest, order_items};
use crate::error::{Result, add_breadcrumb};
use crate::fetch::{FetchOutcome, Fetcher};
use crate::filters;
use crate::middleware::{PageContext, RequireAuth};
use crate::services::{
    CartStore, CheckoutSelections, CheckoutSummary, SessionStore, ShippingSelection,
};
use crate::state::AppState;

// =============================================================================
// View Types
// =============================================================================

/// Price breakdown display data.
#[derive(Clone)]
pub struct SummaryView {
    pub subtotal: String,
    /// Shown as a negative amount, only when a discount applies.
    pub discount: Option<String>,
    pub discount_code: Option<String>,
    pub shipping: Option<String>,
    pub postal_code: String,
    pub eta: Option<String>,
    pub total: String,
}

impl SummaryView {
    fn new(summary: &CheckoutSummary, selections: &CheckoutSelections) -> Self {
        let shipping = selections.shipping.as_ref();
        Self {
            subtotal: format_money(summary.subtotal),
            discount: (!summary.discount.is_zero()).then(|| format_money(-summary.discount)),
            discount_code: selections.discount.as_ref().map(|d| d.code.clone()),
            shipping: shipping.map(|_| format_money(summary.shipping)),
            postal_code: shipping.map(|s| s.postal_code.clone()).unwrap_or_default(),
            eta: shipping.and_then(|s| {
                s.quote.estimated_days.map(|days| match days {
                    1 => "1 business day".to_string(),
                    n => format!("{n} business days"),
                })
            }),
            total: format_money(summary.total),
        }
    }
}

// =============================================================================
// Form Types
// =============================================================================

/// Discount code form data. An empty code removes the discount.
#[derive(Debug, Deserialize)]
pub struct DiscountForm {
    #[serde(default)]
    pub code: String,
}

/// Shipping quote form data.
#[derive(Debug, Deserialize)]
pub struct ShippingForm {
    pub postal_code: String,
}

/// `?order=` on the confirmation page.
#[derive(Debug, Deserialize)]
pub struct CompleteQuery {
    pub order: Option<OrderId>,
}

// =============================================================================
// Templates
// =============================================================================

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub page: PageContext,
    pub cart: CartView,
    pub summary: SummaryView,
    pub error: Option<String>,
}

/// Summary fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/checkout_summary.html")]
pub struct CheckoutSummaryTemplate {
    pub summary: SummaryView,
}

/// Order confirmation page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/complete.html")]
pub struct CompleteTemplate {
    pub page: PageContext,
    pub order_id: Option<String>,
}

/// Re-render the summary after a selection changed.
async fn summary_fragment(store: &SessionStore, cart: &CartStore) -> Result<Response> {
    let selections = CheckoutSelections::load(store.session()).await?;
    let summary = selections.summary(&cart.snapshot());

    Ok(CheckoutSummaryTemplate {
        summary: SummaryView::new(&summary, &selections),
    }
    .into_response())
}

/// Only hand the visitor off to http(s) payment pages.
fn payment_redirect(url: Option<&str>) -> Option<&str> {
    let url = url?;
    let parsed = url::Url::parse(url).ok()?;
    matches!(parsed.scheme(), "https" | "http").then_some(url)
}

// =============================================================================
// Handlers
// =============================================================================

/// Display checkout summary.
#[instrument(skip_all, fields(user_id = %auth.user.id))]
pub async fn show(
    page: PageContext,
    store: SessionStore,
    cart: CartStore,
    RequireAuth(auth): RequireAuth,
) -> Result<Response> {
    let state = cart.snapshot();
    if state.is_empty() {
        return Ok(Redirect::to("/cart").into_response());
    }

    let selections = CheckoutSelections::load(store.session()).await?;
    let summary = selections.summary(&state);

    Ok(CheckoutTemplate {
        page,
        cart: CartView::from(&state),
        summary: SummaryView::new(&summary, &selections),
        error: None,
    }
    .into_response())
}

/// Validate and apply a discount code (HTMX).
#[instrument(skip(state, store, cart))]
pub async fn apply_discount(
    State(state): State<AppState>,
    store: SessionStore,
    cart: CartStore,
    _: RequireAuth,
    Form(form): Form<DiscountForm>,
) -> Result<Response> {
    let code = form.code.trim();

    if code.is_empty() {
        CheckoutSelections::save_discount(store.session(), None).await?;
        return summary_fragment(&store, &cart).await;
    }

    let subtotal = cart.snapshot().total();
    let fetcher = Fetcher::new();

    match fetcher
        .run(state.api().validate_discount(code, subtotal))
        .await
    {
        FetchOutcome::Data(discount) => {
            CheckoutSelections::save_discount(store.session(), Some(&discount)).await?;
            add_breadcrumb("checkout", "Applied discount", &[("code", code)]);
            summary_fragment(&store, &cart).await
        }
        FetchOutcome::Failed(e) if e.is_not_found() => {
            Ok(flash_error(format!("The code {code} is not valid.")))
        }
        FetchOutcome::Failed(e) => Ok(flash_error(e.user_message())),
        FetchOutcome::Cancelled => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// Quote shipping to a postal code (HTMX).
#[instrument(skip(state, store, cart))]
pub async fn quote_shipping(
    State(state): State<AppState>,
    store: SessionStore,
    cart: CartStore,
    _: RequireAuth,
    Form(form): Form<ShippingForm>,
) -> Result<Response> {
    let postal_code = form.postal_code.trim();
    if postal_code.is_empty() {
        return Ok(flash_error("Please enter a postal code.".to_string()));
    }

    let request = ShippingQuoteRequest {
        postal_code: postal_code.to_string(),
        items: order_items(&cart.snapshot()),
    };

    let fetcher = Fetcher::new();
    match fetcher.run(state.api().shipping_quote(&request)).await {
        FetchOutcome::Data(quote) => {
            let selection = ShippingSelection {
                postal_code: request.postal_code,
                quote,
            };
            CheckoutSelections::save_shipping(store.session(), &selection).await?;
            summary_fragment(&store, &cart).await
        }
        FetchOutcome::Failed(e) => Ok(flash_error(e.user_message())),
        FetchOutcome::Cancelled => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// Place the order, empty the cart and hand off to payment.
#[instrument(skip_all, fields(user_id = %auth.user.id))]
pub async fn place_order(
    State(state): State<AppState>,
    page: PageContext,
    store: SessionStore,
    cart: CartStore,
    RequireAuth(auth): RequireAuth,
) -> Result<Response> {
    let snapshot = cart.snapshot();
    if snapshot.is_empty() {
        return Ok(Redirect::to("/cart").into_response());
    }

    let selections = CheckoutSelections::load(store.session()).await?;
    let order = NewOrder {
        items: order_items(&snapshot),
        discount_code: selections.discount.as_ref().map(|d| d.code.clone()),
        postal_code: selections.shipping.as_ref().map(|s| s.postal_code.clone()),
    };

    let fetcher = Fetcher::new();
    match fetcher
        .run(state.api().create_order(&auth.token, &order))
        .await
    {
        FetchOutcome::Data(placed) => {
            cart.dispatch(CartIntent::Clear).await?;
            CheckoutSelections::clear(store.session()).await?;

            tracing::info!(order_id = %placed.id, total = %placed.total, "Order placed");
            add_breadcrumb("checkout", "Order placed", &[("order_id", placed.id.as_str())]);

            let target = payment_redirect(placed.payment_url.as_deref()).map_or_else(
                || format!("/checkout/complete?order={}", placed.id),
                ToString::to_string,
            );
            Ok(Redirect::to(&target).into_response())
        }
        FetchOutcome::Failed(e) if e.is_unauthorized() => session_expired(&store, "/checkout").await,
        FetchOutcome::Failed(e) => {
            let status = e
                .status()
                .filter(StatusCode::is_client_error)
                .unwrap_or(StatusCode::BAD_GATEWAY);
            let summary = selections.summary(&snapshot);
            Ok((
                status,
                CheckoutTemplate {
                    page,
                    cart: CartView::from(&snapshot),
                    summary: SummaryView::new(&summary, &selections),
                    error: Some(e.user_message()),
                },
            )
                .into_response())
        }
        FetchOutcome::Cancelled => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// Display order confirmation.
pub async fn complete(page: PageContext, Query(query): Query<CompleteQuery>) -> impl IntoResponse {
    CompleteTemplate {
        page,
        order_id: query.order.map(|id| id.to_string()),
    }
}
