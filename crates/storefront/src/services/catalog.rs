//! Product list filtering and sorting.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use crate::api::Product;

/// Sort order for product lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    /// Order returned by the API.
    #[default]
    Featured,
    PriceAsc,
    PriceDesc,
    Name,
}

impl ProductSort {
    pub const ALL: [Self; 4] = [Self::Featured, Self::PriceAsc, Self::PriceDesc, Self::Name];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Featured => "featured",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::Name => "name",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Featured => "Featured",
            Self::PriceAsc => "Price: low to high",
            Self::PriceDesc => "Price: high to low",
            Self::Name => "Name",
        }
    }
}

/// Query-string filter for `/products`.
///
/// Empty form fields deserialize as `None`, as do price bounds that are not
/// numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProductFilter {
    #[serde(deserialize_with = "empty_as_none")]
    pub q: Option<String>,
    #[serde(deserialize_with = "empty_as_none")]
    pub category: Option<String>,
    #[serde(deserialize_with = "empty_as_none")]
    pub brand: Option<String>,
    #[serde(deserialize_with = "unparsable_as_none")]
    pub min_price: Option<Decimal>,
    #[serde(deserialize_with = "unparsable_as_none")]
    pub max_price: Option<Decimal>,
    pub sort: ProductSort,
}

impl ProductFilter {
    /// Products matching every set criterion, in the requested order.
    #[must_use]
    pub fn apply<'a>(&self, products: &'a [Product]) -> Vec<&'a Product> {
        let needle = self.q.as_deref().map(str::to_lowercase);

        let mut matched: Vec<&Product> = products
            .iter()
            .filter(|p| needle.as_deref().is_none_or(|n| matches_text(p, n)))
            .filter(|p| matches_exact(self.category.as_deref(), p.category.as_deref()))
            .filter(|p| matches_exact(self.brand.as_deref(), p.brand.as_deref()))
            .filter(|p| self.min_price.is_none_or(|min| p.price >= min))
            .filter(|p| self.max_price.is_none_or(|max| p.price <= max))
            .collect();

        match self.sort {
            ProductSort::Featured => {}
            ProductSort::PriceAsc => matched.sort_by(|a, b| a.price.cmp(&b.price)),
            ProductSort::PriceDesc => matched.sort_by(|a, b| b.price.cmp(&a.price)),
            ProductSort::Name => {
                matched.sort_by_cached_key(|p| p.name.to_lowercase());
            }
        }

        matched
    }

    /// Whether any criterion other than sort is set.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.q.is_some()
            || self.category.is_some()
            || self.brand.is_some()
            || self.min_price.is_some()
            || self.max_price.is_some()
    }
}

fn matches_text(product: &Product, needle: &str) -> bool {
    let contains = |s: &str| s.to_lowercase().contains(needle);
    contains(&product.name)
        || product.brand.as_deref().is_some_and(contains)
        || product.description.as_deref().is_some_and(contains)
}

fn matches_exact(wanted: Option<&str>, actual: Option<&str>) -> bool {
    wanted.is_none_or(|w| actual.is_some_and(|a| a.eq_ignore_ascii_case(w)))
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

fn unparsable_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr,
{
    Ok(empty_as_none(deserializer)?.and_then(|s| s.parse().ok()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::extract::Query;
    use perfumeria_core::ProductId;

    use super::*;

    fn product(id: &str, name: &str, price: i64, brand: &str, category: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: name.to_string(),
            description: Some(format!("{name} eau de parfum")),
            price: Decimal::new(price, 0),
            images: vec![],
            category: Some(category.to_string()),
            brand: Some(brand.to_string()),
            stock: None,
            featured: false,
        }
    }

    fn catalog() -> Vec<Product> {
        vec![
            product("1", "Rose Absolue", 120, "Maison Lune", "women"),
            product("2", "Cedar Smoke", 80, "Norte", "men"),
            product("3", "amber Night", 95, "Maison Lune", "unisex"),
        ]
    }

    fn ids(products: &[&Product]) -> Vec<String> {
        products.iter().map(|p| p.id.to_string()).collect()
    }

    #[test]
    fn test_default_filter_keeps_api_order() {
        let products = catalog();
        assert_eq!(ids(&ProductFilter::default().apply(&products)), ["1", "2", "3"]);
    }

    #[test]
    fn test_text_search_is_case_insensitive_over_brand() {
        let products = catalog();
        let filter = ProductFilter {
            q: Some("maison".to_string()),
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(&products)), ["1", "3"]);
    }

    #[test]
    fn test_price_bounds_are_inclusive() {
        let products = catalog();
        let filter = ProductFilter {
            min_price: Some(Decimal::new(80, 0)),
            max_price: Some(Decimal::new(95, 0)),
            sort: ProductSort::PriceDesc,
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(&products)), ["3", "2"]);
    }

    #[test]
    fn test_sort_by_name_ignores_case() {
        let products = catalog();
        let filter = ProductFilter {
            sort: ProductSort::Name,
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(&products)), ["3", "2", "1"]);
    }

    #[test]
    fn test_category_must_match() {
        let products = catalog();
        let filter = ProductFilter {
            category: Some("MEN".to_string()),
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(&products)), ["2"]);
        assert!(filter.is_active());
    }

    #[test]
    fn test_deserialize_treats_empty_fields_as_unset() {
        let filter: ProductFilter =
            serde_json::from_value(serde_json::json!({ "q": "", "min_price": " ", "sort": "price_asc" }))
                .unwrap();
        assert_eq!(filter.q, None);
        assert_eq!(filter.min_price, None);
        assert_eq!(filter.sort, ProductSort::PriceAsc);
        assert!(!filter.is_active());
    }

    #[test]
    fn test_malformed_price_bounds_are_ignored() {
        let uri = "/products?q=rose&min_price=abc&max_price=ten&sort=price_desc"
            .parse()
            .unwrap();
        let Query(filter) = Query::<ProductFilter>::try_from_uri(&uri).unwrap();

        assert_eq!(filter.q.as_deref(), Some("rose"));
        assert_eq!(filter.min_price, None);
        assert_eq!(filter.max_price, None);
        assert_eq!(filter.sort, ProductSort::PriceDesc);

        let uri = "/products?min_price=10&max_price=oops".parse().unwrap();
        let Query(filter) = Query::<ProductFilter>::try_from_uri(&uri).unwrap();
        assert_eq!(filter.min_price, Some(Decimal::new(10, 0)));
        assert_eq!(filter.max_price, None);
    }
}
