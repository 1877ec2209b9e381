//! Request and response bodies of the remote REST API.
//!
//! The API speaks camelCase JSON. Optional fields default so that older API
//! deployments which omit them still decode.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use perfumeria_core::{
    BrandId, CartLine, CartProduct, CartState, CategoryId, OrderId, ProductId, Role,
    SubscriptionId, UserId,
};

// =============================================================================
// Envelope
// =============================================================================

/// Success envelope: `{ "data": T }`.
#[derive(Debug, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

/// Error envelope: `{ "error": "...", "message": "..." }`.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

// =============================================================================
// Users & Auth
// =============================================================================

/// A user as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiUser {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

/// Successful login or registration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthPayload {
    pub token: String,
    pub user: ApiUser,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct RegisterRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

/// Partial profile update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

// =============================================================================
// Catalog
// =============================================================================

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub stock: Option<u32>,
    #[serde(default)]
    pub featured: bool,
}

impl Product {
    /// Whether the product can be added to the cart.
    #[must_use]
    pub fn in_stock(&self) -> bool {
        self.stock.is_none_or(|s| s > 0)
    }

    /// The payload dispatched when this product is added to the cart.
    #[must_use]
    pub fn to_cart_product(&self) -> CartProduct {
        CartProduct {
            id: self.id.clone(),
            name: self.name.clone(),
            price: self.price,
            images: self.images.clone(),
        }
    }
}

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// A product brand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brand {
    pub id: BrandId,
    pub name: String,
}

// =============================================================================
// Discounts & Shipping
// =============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct DiscountRequest<'a> {
    pub code: &'a str,
    pub subtotal: Decimal,
}

/// How a discount value is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    /// `value` is a percentage of the subtotal (0-100).
    Percentage,
    /// `value` is a fixed amount.
    Fixed,
}

/// A validated discount code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discount {
    pub code: String,
    pub kind: DiscountKind,
    pub value: Decimal,
}

/// A line sent to the API for quoting or ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub price: Decimal,
}

impl From<&CartLine> for OrderItem {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.id.clone(),
            quantity: line.quantity,
            price: line.price,
        }
    }
}

/// Convert every cart line into an order item.
#[must_use]
pub fn order_items(cart: &CartState) -> Vec<OrderItem> {
    cart.lines.iter().map(OrderItem::from).collect()
}

/// Shipping quote request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingQuoteRequest {
    pub postal_code: String,
    pub items: Vec<OrderItem>,
}

/// Shipping cost quoted by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingQuote {
    pub cost: Decimal,
    #[serde(default)]
    pub estimated_days: Option<u32>,
    #[serde(default)]
    pub carrier: Option<String>,
}

// =============================================================================
// Subscriptions
// =============================================================================

/// Delivery frequency of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionFrequency {
    Monthly,
    Bimonthly,
    Quarterly,
}

impl SubscriptionFrequency {
    /// All frequencies, in the order shown in forms.
    pub const ALL: [Self; 3] = [Self::Monthly, Self::Bimonthly, Self::Quarterly];

    /// Wire value, also used as the form value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Bimonthly => "bimonthly",
            Self::Quarterly => "quarterly",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Monthly => "Every month",
            Self::Bimonthly => "Every two months",
            Self::Quarterly => "Every three months",
        }
    }
}

/// Lifecycle state of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Paused,
    Cancelled,
}

/// A recurring delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: SubscriptionId,
    pub product_id: ProductId,
    #[serde(default)]
    pub product_name: Option<String>,
    pub frequency: SubscriptionFrequency,
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub next_delivery: Option<NaiveDate>,
}

/// Body for creating a subscription.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubscription {
    pub product_id: ProductId,
    pub frequency: SubscriptionFrequency,
}

/// Body for updating a subscription; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<SubscriptionFrequency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SubscriptionStatus>,
}

// =============================================================================
// Orders
// =============================================================================

/// Body for placing an order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub items: Vec<OrderItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub status: String,
    pub total: Decimal,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    /// Hosted payment page to hand the customer off to.
    #[serde(default)]
    pub payment_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Remote configuration
// =============================================================================

/// Landing page content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandingConfig {
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub subheadline: Option<String>,
    #[serde(default)]
    pub hero_image: Option<String>,
    #[serde(default)]
    pub featured_product_ids: Vec<ProductId>,
}

/// Maintenance-mode switch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub message: Option<String>,
}
