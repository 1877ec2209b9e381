//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `cart` - Session-backed cart store
//! - `session` - Authenticated session store
//! - `image_cache` - Product image preloading
//! - `storage` - Process-lifetime key/value storage
//! - `catalog` - Product list filtering
//! - `checkout` - Checkout totals and selections

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod image_cache;
pub mod session;
pub mod storage;

pub use cart::CartStore;
pub use catalog::{ProductFilter, ProductSort};
pub use checkout::{CheckoutSelections, CheckoutSummary, ShippingSelection};
pub use image_cache::{IMAGE_CACHE_TTL, ImageCache, ImageCacheEntry, ImageCacheError};
pub use session::{SessionError, SessionStore};
pub use storage::{MemoryStorage, SessionStorage};
