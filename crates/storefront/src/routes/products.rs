//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::instrument;

use perfumeria_core::{ProductId, format_money};

use super::ErrorPageTemplate;
use crate::api::{Brand, Category, Product, SubscriptionFrequency};
use crate::fetch::{FetchOutcome, Fetcher};
use crate::filters;
use crate::middleware::PageContext;
use crate::services::{ImageCache, ProductFilter, ProductSort};
use crate::state::AppState;

/// Product card data for grids.
#[derive(Clone)]
pub struct ProductCard {
    pub id: String,
    pub name: String,
    pub brand: Option<String>,
    pub price: String,
    pub image: Option<String>,
    /// Image already warmed; render with `loading="eager"`.
    pub eager: bool,
    pub in_stock: bool,
}

impl ProductCard {
    #[must_use]
    pub fn new(product: &Product, images: &ImageCache) -> Self {
        let image = product.images.first().cloned();
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            brand: product.brand.clone(),
            price: format_money(product.price),
            eager: image.as_deref().is_some_and(|url| images.is_cached(url)),
            image,
            in_stock: product.in_stock(),
        }
    }
}

/// Product detail data.
#[derive(Clone)]
pub struct ProductDetail {
    pub id: String,
    pub name: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub price: String,
    pub images: Vec<String>,
    pub in_stock: bool,
}

impl From<&Product> for ProductDetail {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            brand: product.brand.clone(),
            category: product.category.clone(),
            description: product.description.clone(),
            price: format_money(product.price),
            images: product.images.clone(),
            in_stock: product.in_stock(),
        }
    }
}

/// `<option>` data for select inputs.
#[derive(Clone)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

impl SelectOption {
    fn facets(items: impl IntoIterator<Item = String>, current: Option<&str>) -> Vec<Self> {
        items
            .into_iter()
            .map(|name| Self {
                selected: current.is_some_and(|c| c.eq_ignore_ascii_case(&name)),
                label: name.clone(),
                value: name,
            })
            .collect()
    }
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub page: PageContext,
    pub grid: ProductGridTemplate,
    pub q: String,
    pub min_price: String,
    pub max_price: String,
    pub categories: Vec<SelectOption>,
    pub brands: Vec<SelectOption>,
    pub sorts: Vec<SelectOption>,
}

/// Product grid fragment (HTMX filter updates).
#[derive(Template, WebTemplate)]
#[template(path = "partials/product_grid.html")]
pub struct ProductGridTemplate {
    pub products: Vec<ProductCard>,
    pub total: usize,
    pub filtered: bool,
    pub error: Option<String>,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub page: PageContext,
    pub product: ProductDetail,
    pub frequencies: Vec<SelectOption>,
}

/// Warm the first image of each product in the background.
pub fn preload_card_images(images: &ImageCache, products: &[&Product]) {
    images.spawn_preload(
        products
            .iter()
            .filter_map(|p| p.images.first().cloned())
            .collect(),
    );
}

/// Display product listing page.
///
/// HTMX requests receive only the grid fragment.
#[instrument(skip(state, page, headers))]
pub async fn index(
    State(state): State<AppState>,
    page: PageContext,
    headers: HeaderMap,
    Query(filter): Query<ProductFilter>,
) -> Response {
    let fetcher = Fetcher::new();

    let (products, error) = match fetcher.run(state.api().products()).await {
        FetchOutcome::Data(products) => (products, None),
        FetchOutcome::Cancelled => (Vec::new(), None),
        FetchOutcome::Failed(e) => (Vec::new(), Some(e.user_message())),
    };

    let matched = filter.apply(&products);
    preload_card_images(state.images(), &matched);

    let grid = ProductGridTemplate {
        products: matched
            .iter()
            .map(|p| ProductCard::new(p, state.images()))
            .collect(),
        total: matched.len(),
        filtered: filter.is_active(),
        error,
    };

    if headers.contains_key("hx-request") {
        return grid.into_response();
    }

    // Facets are optional; the list still renders without them.
    let categories: Vec<Category> = fetcher
        .run(state.api().categories())
        .await
        .data()
        .unwrap_or_default();
    let brands: Vec<Brand> = fetcher
        .run(state.api().brands())
        .await
        .data()
        .unwrap_or_default();

    ProductsIndexTemplate {
        page,
        grid,
        q: filter.q.clone().unwrap_or_default(),
        min_price: filter.min_price.map(|p| p.to_string()).unwrap_or_default(),
        max_price: filter.max_price.map(|p| p.to_string()).unwrap_or_default(),
        categories: SelectOption::facets(
            categories.into_iter().map(|c| c.name),
            filter.category.as_deref(),
        ),
        brands: SelectOption::facets(
            brands.into_iter().map(|b| b.name),
            filter.brand.as_deref(),
        ),
        sorts: ProductSort::ALL
            .iter()
            .map(|s| SelectOption {
                value: s.as_str().to_string(),
                label: s.label().to_string(),
                selected: *s == filter.sort,
            })
            .collect(),
    }
    .into_response()
}

/// Display product detail page.
#[instrument(skip(state, page))]
pub async fn show(
    State(state): State<AppState>,
    page: PageContext,
    Path(id): Path<ProductId>,
) -> Response {
    let fetcher = Fetcher::new();

    match fetcher.run(state.api().product(&id)).await {
        FetchOutcome::Data(product) => {
            state.images().spawn_preload(product.images.clone());
            ProductShowTemplate {
                page,
                product: ProductDetail::from(&product),
                frequencies: SubscriptionFrequency::ALL
                    .iter()
                    .map(|f| SelectOption {
                        value: f.as_str().to_string(),
                        label: f.label().to_string(),
                        selected: *f == SubscriptionFrequency::Monthly,
                    })
                    .collect(),
            }
            .into_response()
        }
        FetchOutcome::Failed(e) if e.is_not_found() => ErrorPageTemplate::not_found(page),
        FetchOutcome::Failed(e) => {
            ErrorPageTemplate::respond(page, StatusCode::BAD_GATEWAY, e.user_message())
        }
        FetchOutcome::Cancelled => StatusCode::NO_CONTENT.into_response(),
    }
}
