//! Cart route handlers.
//!
//! Every mutation goes through [`CartStore::dispatch`] and answers with a
//! fragment. When the store published a new state the response also carries
//! `HX-Trigger: cart-updated`, so the badge and sidebar re-fetch themselves.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{AppendHeaders, IntoResponse, Response},
};
use serde::Deserialize;
use tokio::sync::watch;
use tracing::instrument;

use perfumeria_core::{CartIntent, CartLine, CartState, ProductId, format_money};

use super::flash_error;
use crate::error::{Result, add_breadcrumb};
use crate::fetch::{FetchOutcome, Fetcher};
use crate::filters;
use crate::middleware::PageContext;
use crate::services::CartStore;
use crate::state::AppState;

/// Event name clients listen for to refresh cart widgets.
pub const CART_UPDATED: &str = "cart-updated";

// =============================================================================
// View Types
// =============================================================================

/// Cart line display data for templates.
#[derive(Clone)]
pub struct CartLineView {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    pub quantity: u32,
    pub price: String,
    pub line_total: String,
}

impl From<&CartLine> for CartLineView {
    fn from(line: &CartLine) -> Self {
        Self {
            id: line.id.to_string(),
            name: line.name.clone(),
            image: line.image().map(ToString::to_string),
            quantity: line.quantity,
            price: format_money(line.price),
            line_total: format_money(line.line_total()),
        }
    }
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub subtotal: String,
    pub item_count: u32,
    pub is_open: bool,
}

impl CartView {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl From<&CartState> for CartView {
    fn from(state: &CartState) -> Self {
        Self {
            lines: state.lines.iter().map(CartLineView::from).collect(),
            subtotal: format_money(state.total()),
            item_count: state.item_count(),
            is_open: state.is_open,
        }
    }
}

// =============================================================================
// Form Types
// =============================================================================

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub id: ProductId,
}

/// Update quantity form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub id: ProductId,
    pub quantity: i64,
}

/// Remove line form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub id: ProductId,
}

// =============================================================================
// Templates
// =============================================================================

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub page: PageContext,
    pub cart: CartView,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
}

/// Cart sidebar fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_sidebar.html")]
pub struct CartSidebarTemplate {
    pub cart: CartView,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

/// Respond with `body`, adding `HX-Trigger` if `changes` saw a new state.
fn updated(changes: &watch::Receiver<CartState>, body: impl IntoResponse) -> Response {
    if changes.has_changed().unwrap_or(false) {
        (AppendHeaders([("HX-Trigger", CART_UPDATED)]), body).into_response()
    } else {
        body.into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Display cart page.
#[instrument(skip_all)]
pub async fn show(page: PageContext, cart: CartStore) -> impl IntoResponse {
    CartShowTemplate {
        page,
        cart: CartView::from(&cart.snapshot()),
    }
}

/// Cart sidebar fragment (HTMX).
#[instrument(skip_all)]
pub async fn sidebar(cart: CartStore) -> impl IntoResponse {
    CartSidebarTemplate {
        cart: CartView::from(&cart.snapshot()),
    }
}

/// Cart count badge fragment (HTMX).
#[instrument(skip_all)]
pub async fn count(cart: CartStore) -> impl IntoResponse {
    CartCountTemplate {
        count: cart.snapshot().item_count(),
    }
}

/// Add one unit of a product (HTMX).
///
/// The product is looked up through the API so the price and name come from
/// the catalog rather than the form.
#[instrument(skip(state, cart), fields(product_id = %form.id))]
pub async fn add(
    State(state): State<AppState>,
    cart: CartStore,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let fetcher = Fetcher::new();

    let product = match fetcher.run(state.api().product(&form.id)).await {
        FetchOutcome::Data(product) => product,
        FetchOutcome::Failed(e) => return Ok(flash_error(e.user_message())),
        FetchOutcome::Cancelled => {
            let count = cart.snapshot().item_count();
            return Ok(CartCountTemplate { count }.into_response());
        }
    };

    if !product.in_stock() {
        return Ok(flash_error(format!("{} is out of stock.", product.name)));
    }

    let changes = cart.subscribe();
    let next = cart.dispatch(CartIntent::Add(product.to_cart_product())).await?;
    add_breadcrumb("cart", "Added to cart", &[("product_id", form.id.as_str())]);

    Ok(updated(&changes, CartCountTemplate {
        count: next.item_count(),
    }))
}

/// Set a line's quantity; zero or less removes it (HTMX).
#[instrument(skip(cart), fields(product_id = %form.id))]
pub async fn update(cart: CartStore, Form(form): Form<UpdateCartForm>) -> Result<Response> {
    let changes = cart.subscribe();
    let next = cart
        .dispatch(CartIntent::SetQuantity(form.id.clone(), form.quantity))
        .await?;
    let quantity = form.quantity.to_string();
    add_breadcrumb(
        "cart",
        "Updated quantity",
        &[("product_id", form.id.as_str()), ("quantity", quantity.as_str())],
    );

    Ok(updated(&changes, CartItemsTemplate {
        cart: CartView::from(&next),
    }))
}

/// Remove a line (HTMX).
#[instrument(skip(cart), fields(product_id = %form.id))]
pub async fn remove(cart: CartStore, Form(form): Form<RemoveFromCartForm>) -> Result<Response> {
    let changes = cart.subscribe();
    let next = cart.dispatch(CartIntent::Remove(form.id.clone())).await?;
    add_breadcrumb("cart", "Removed from cart", &[("product_id", form.id.as_str())]);

    Ok(updated(&changes, CartItemsTemplate {
        cart: CartView::from(&next),
    }))
}

/// Open or close the sidebar (HTMX).
#[instrument(skip_all)]
pub async fn toggle(cart: CartStore) -> Result<Response> {
    let changes = cart.subscribe();
    let next = cart.dispatch(CartIntent::ToggleOpen).await?;

    Ok(updated(&changes, CartSidebarTemplate {
        cart: CartView::from(&next),
    }))
}

/// Empty the cart (HTMX).
#[instrument(skip_all)]
pub async fn clear(cart: CartStore) -> Result<Response> {
    let changes = cart.subscribe();
    let next = cart.dispatch(CartIntent::Clear).await?;
    add_breadcrumb("cart", "Cleared cart", &[]);

    Ok(updated(&changes, CartItemsTemplate {
        cart: CartView::from(&next),
    }))
}
