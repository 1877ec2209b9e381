//! Cache types for catalog and configuration responses.

use perfumeria_core::ProductId;

use super::types::{Brand, Category, LandingConfig, MaintenanceConfig, Product};

/// Cache key for cacheable API responses.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Products,
    Product(ProductId),
    Categories,
    Brands,
    Landing,
    Maintenance,
}

impl CacheKey {
    /// Whether the entry belongs to the product catalog.
    #[must_use]
    pub const fn is_catalog(&self) -> bool {
        matches!(
            self,
            Self::Products | Self::Product(_) | Self::Categories | Self::Brands
        )
    }
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Products(Vec<Product>),
    Product(Box<Product>),
    Categories(Vec<Category>),
    Brands(Vec<Brand>),
    Landing(LandingConfig),
    Maintenance(MaintenanceConfig),
}
