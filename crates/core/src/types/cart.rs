//! Cart state and the reducer that mutates it.
//!
//! The cart is a plain value: [`CartState::apply`] is the only way lines
//! change, and it is a total function - every intent is valid in every state.
//! Derived figures ([`CartState::total`], [`CartState::item_count`]) are
//! recomputed from `lines` on each read and never stored.
//!
//! Invariants upheld by `apply`:
//! - at most one line per product id
//! - every stored line has `quantity >= 1`

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;

/// A product as submitted to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartProduct {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub images: Vec<String>,
}

/// One product entry in the cart with an aggregated quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub images: Vec<String>,
    pub quantity: u32,
}

impl CartLine {
    /// Price multiplied by quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }

    /// First image, if any.
    #[must_use]
    pub fn image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// An intent dispatched against the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartIntent {
    /// Add one unit of a product, creating the line if needed.
    Add(CartProduct),
    /// Remove a product line. No-op if absent.
    Remove(ProductId),
    /// Set a line's quantity. Zero or negative removes the line.
    SetQuantity(ProductId, i64),
    /// Flip the cart panel visibility.
    ToggleOpen,
    /// Remove every line.
    Clear,
}

/// Current cart contents and panel visibility.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartState {
    /// Lines in insertion order, which is also display order.
    #[serde(default)]
    pub lines: Vec<CartLine>,
    /// Whether the cart sidebar is open.
    #[serde(default)]
    pub is_open: bool,
}

impl CartState {
    /// An empty, closed cart.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lines: Vec::new(),
            is_open: false,
        }
    }

    /// Apply an intent to the cart.
    pub fn apply(&mut self, intent: CartIntent) {
        match intent {
            CartIntent::Add(product) => self.add(product),
            CartIntent::Remove(id) => self.remove(&id),
            CartIntent::SetQuantity(id, quantity) => self.set_quantity(&id, quantity),
            CartIntent::ToggleOpen => self.is_open = !self.is_open,
            CartIntent::Clear => self.lines.clear(),
        }
    }

    /// Consuming variant of [`apply`](Self::apply).
    #[must_use]
    pub fn reduce(mut self, intent: CartIntent) -> Self {
        self.apply(intent);
        self
    }

    fn add(&mut self, product: CartProduct) {
        if let Some(line) = self.lines.iter_mut().find(|l| l.id == product.id) {
            line.quantity = line.quantity.saturating_add(1);
            return;
        }

        self.lines.push(CartLine {
            id: product.id,
            name: product.name,
            price: product.price,
            images: product.images,
            quantity: 1,
        });
    }

    fn remove(&mut self, id: &ProductId) {
        self.lines.retain(|l| &l.id != id);
    }

    fn set_quantity(&mut self, id: &ProductId, quantity: i64) {
        if quantity <= 0 {
            self.remove(id);
            return;
        }

        if let Some(line) = self.lines.iter_mut().find(|l| &l.id == id) {
            line.quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        }
    }

    /// Sum of price times quantity over all lines.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Sum of quantities over all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0u32, |acc, l| acc.saturating_add(l.quantity))
    }

    /// Look up the line for a product.
    #[must_use]
    pub fn line(&self, id: &ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.id == id)
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn product(id: &str, price: i64) -> CartProduct {
        CartProduct {
            id: ProductId::new(id),
            name: format!("Perfume {id}"),
            price: Decimal::new(price, 0),
            images: vec![format!("https://cdn.example.com/{id}.jpg")],
        }
    }

    #[test]
    fn test_add_same_product_twice() {
        let cart = CartState::new()
            .reduce(CartIntent::Add(product("p1", 50)))
            .reduce(CartIntent::Add(product("p1", 50)));

        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 2);
        assert_eq!(cart.total(), Decimal::new(100, 0));
        assert_eq!(cart.item_count(), 2);
    }

    #[test]
    fn test_add_appends_in_insertion_order() {
        let cart = CartState::new()
            .reduce(CartIntent::Add(product("b", 10)))
            .reduce(CartIntent::Add(product("a", 20)))
            .reduce(CartIntent::Add(product("b", 10)));

        let ids: Vec<_> = cart.lines.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut cart = CartState::new().reduce(CartIntent::Add(product("p1", 5)));
        cart.apply(CartIntent::Remove(ProductId::new("p1")));
        let after_first = cart.clone();
        cart.apply(CartIntent::Remove(ProductId::new("p1")));

        assert_eq!(cart, after_first);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_zero_removes_line() {
        let cart = CartState::new()
            .reduce(CartIntent::Add(product("p1", 5)))
            .reduce(CartIntent::Add(product("p2", 7)))
            .reduce(CartIntent::SetQuantity(ProductId::new("p1"), 0));

        assert!(cart.line(&ProductId::new("p1")).is_none());
        assert_eq!(cart.lines.len(), 1);
    }

    #[test]
    fn test_set_quantity_negative_removes_line() {
        let cart = CartState::new()
            .reduce(CartIntent::Add(product("p1", 5)))
            .reduce(CartIntent::SetQuantity(ProductId::new("p1"), -3));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_updates_existing_line() {
        let cart = CartState::new()
            .reduce(CartIntent::Add(product("p1", 5)))
            .reduce(CartIntent::SetQuantity(ProductId::new("p1"), 4));

        assert_eq!(cart.line(&ProductId::new("p1")).unwrap().quantity, 4);
        assert_eq!(cart.total(), Decimal::new(20, 0));
    }

    #[test]
    fn test_set_quantity_unknown_id_is_noop() {
        let cart = CartState::new().reduce(CartIntent::SetQuantity(ProductId::new("ghost"), 3));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_clamps_to_u32() {
        let cart = CartState::new()
            .reduce(CartIntent::Add(product("p1", 1)))
            .reduce(CartIntent::SetQuantity(ProductId::new("p1"), i64::MAX));
        assert_eq!(cart.lines[0].quantity, u32::MAX);
    }

    #[test]
    fn test_toggle_open_does_not_touch_lines() {
        let cart = CartState::new()
            .reduce(CartIntent::Add(product("p1", 1)))
            .reduce(CartIntent::ToggleOpen);

        assert!(cart.is_open);
        assert_eq!(cart.item_count(), 1);
        assert!(!cart.reduce(CartIntent::ToggleOpen).is_open);
    }

    #[test]
    fn test_clear_empties_lines_only() {
        let cart = CartState::new()
            .reduce(CartIntent::Add(product("p1", 1)))
            .reduce(CartIntent::ToggleOpen)
            .reduce(CartIntent::Clear);

        assert!(cart.is_empty());
        assert!(cart.is_open);
        assert_eq!(cart.total(), Decimal::ZERO);
    }

    #[test]
    fn test_fractional_prices() {
        let mut p = product("p1", 0);
        p.price = Decimal::new(1999, 2);
        let cart = CartState::new()
            .reduce(CartIntent::Add(p.clone()))
            .reduce(CartIntent::Add(p));
        assert_eq!(cart.total(), Decimal::new(3998, 2));
    }

    #[test]
    fn test_state_deserializes_with_missing_fields() {
        let cart: CartState = serde_json::from_str("{}").unwrap();
        assert_eq!(cart, CartState::new());
    }

    fn intent_strategy() -> impl Strategy<Value = CartIntent> {
        let id = prop_oneof![Just("p1"), Just("p2"), Just("p3")];
        prop_oneof![
            (id.clone(), 1i64..500).prop_map(|(id, price)| CartIntent::Add(product(id, price))),
            id.clone()
                .prop_map(|id| CartIntent::Remove(ProductId::new(id))),
            (id, -5i64..20)
                .prop_map(|(id, q)| CartIntent::SetQuantity(ProductId::new(id), q)),
            Just(CartIntent::ToggleOpen),
            Just(CartIntent::Clear),
        ]
    }

    proptest! {
        #[test]
        fn repeated_add_yields_single_line(n in 1u32..64) {
            let mut cart = CartState::new();
            for _ in 0..n {
                cart.apply(CartIntent::Add(product("p1", 3)));
            }
            prop_assert_eq!(cart.lines.len(), 1);
            prop_assert_eq!(cart.lines[0].quantity, n);
        }

        #[test]
        fn invariants_hold_for_any_sequence(intents in proptest::collection::vec(intent_strategy(), 0..64)) {
            let mut cart = CartState::new();
            for intent in intents {
                cart.apply(intent);

                prop_assert!(cart.lines.iter().all(|l| l.quantity >= 1));

                let mut ids: Vec<_> = cart.lines.iter().map(|l| l.id.clone()).collect();
                ids.sort();
                ids.dedup();
                prop_assert_eq!(ids.len(), cart.lines.len());

                let count: u32 = cart.lines.iter().map(|l| l.quantity).sum();
                prop_assert_eq!(cart.item_count(), count);

                let total: Decimal = cart
                    .lines
                    .iter()
                    .map(|l| l.price * Decimal::from(l.quantity))
                    .sum();
                prop_assert_eq!(cart.total(), total);
            }
        }
    }
}
