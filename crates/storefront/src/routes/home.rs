//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use super::products::{ProductCard, preload_card_images};
use crate::api::{LandingConfig, Product};
use crate::fetch::{FetchOutcome, Fetcher};
use crate::filters;
use crate::middleware::PageContext;
use crate::state::AppState;

/// Featured products shown on the home page.
const FEATURED_LIMIT: usize = 8;

const DEFAULT_HEADLINE: &str = "Fragrances worth remembering";

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub page: PageContext,
    pub headline: String,
    pub subheadline: Option<String>,
    pub hero_image: Option<String>,
    pub featured: Vec<ProductCard>,
    pub error: Option<String>,
}

/// Pick the featured products: the landing config's list when it names any,
/// otherwise products flagged as featured.
fn featured_products<'a>(landing: &LandingConfig, products: &'a [Product]) -> Vec<&'a Product> {
    let picked: Vec<&Product> = if landing.featured_product_ids.is_empty() {
        products.iter().filter(|p| p.featured).collect()
    } else {
        landing
            .featured_product_ids
            .iter()
            .filter_map(|id| products.iter().find(|p| &p.id == id))
            .collect()
    };

    picked.into_iter().take(FEATURED_LIMIT).collect()
}

/// Display the home page.
#[instrument(skip(state, page))]
pub async fn home(State(state): State<AppState>, page: PageContext) -> impl IntoResponse {
    let fetcher = Fetcher::new();

    // Landing copy falls back to defaults; only the product list reports errors.
    let landing = fetcher
        .run(state.api().landing_config())
        .await
        .data()
        .unwrap_or_default();

    let (products, error) = match fetcher.run(state.api().products()).await {
        FetchOutcome::Data(products) => (products, None),
        FetchOutcome::Cancelled => (Vec::new(), None),
        FetchOutcome::Failed(e) => (Vec::new(), Some(e.user_message())),
    };

    let featured = featured_products(&landing, &products);
    preload_card_images(state.images(), &featured);

    if let Some(hero) = &landing.hero_image {
        state.images().spawn_preload(vec![hero.clone()]);
    }

    HomeTemplate {
        page,
        headline: landing
            .headline
            .clone()
            .unwrap_or_else(|| DEFAULT_HEADLINE.to_string()),
        subheadline: landing.subheadline.clone(),
        hero_image: landing.hero_image.clone(),
        featured: featured
            .iter()
            .map(|p| ProductCard::new(p, state.images()))
            .collect(),
        error,
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use perfumeria_core::ProductId;
    use rust_decimal::Decimal;

    use super::*;

    fn product(id: &str, featured: bool) -> Product {
        Product {
            id: ProductId::new(id),
            name: id.to_string(),
            description: None,
            price: Decimal::new(1000, 2),
            images: vec![],
            category: None,
            brand: None,
            stock: None,
            featured,
        }
    }

    #[test]
    fn test_featured_falls_back_to_flag() {
        let products = vec![product("a", false), product("b", true)];
        let picked = featured_products(&LandingConfig::default(), &products);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id.as_str(), "b");
    }

    #[test]
    fn test_featured_follows_landing_order_and_skips_unknown_ids() {
        let products = vec![product("a", false), product("b", true), product("c", false)];
        let landing = LandingConfig {
            featured_product_ids: vec![
                ProductId::new("c"),
                ProductId::new("missing"),
                ProductId::new("a"),
            ],
            ..LandingConfig::default()
        };

        let picked = featured_products(&landing, &products);
        let ids: Vec<&str> = picked.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[test]
    fn test_featured_is_capped() {
        let products: Vec<Product> = (0..20).map(|i| product(&i.to_string(), true)).collect();
        assert_eq!(
            featured_products(&LandingConfig::default(), &products).len(),
            FEATURED_LIMIT
        );
    }
}
