//! Checkout arithmetic and the discount/shipping choices kept in the session.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use perfumeria_core::CartState;

use super::session::SessionError;
use crate::api::{Discount, DiscountKind, ShippingQuote};
use crate::models::keys;

/// A shipping quote and the postal code it was quoted for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingSelection {
    pub postal_code: String,
    pub quote: ShippingQuote,
}

/// Discount and shipping chosen so far in the visitor's checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutSelections {
    pub discount: Option<Discount>,
    pub shipping: Option<ShippingSelection>,
}

impl CheckoutSelections {
    /// Read both selections from `session`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session backend fails.
    pub async fn load(session: &Session) -> Result<Self, SessionError> {
        Ok(Self {
            discount: session.get(keys::CHECKOUT_DISCOUNT).await?,
            shipping: session.get(keys::CHECKOUT_SHIPPING).await?,
        })
    }

    /// Store or drop the discount.
    ///
    /// # Errors
    ///
    /// Returns an error if the session backend fails.
    pub async fn save_discount(
        session: &Session,
        discount: Option<&Discount>,
    ) -> Result<(), SessionError> {
        match discount {
            Some(discount) => session.insert(keys::CHECKOUT_DISCOUNT, discount).await?,
            None => {
                session.remove_value(keys::CHECKOUT_DISCOUNT).await?;
            }
        }
        Ok(())
    }

    /// Store the shipping selection.
    ///
    /// # Errors
    ///
    /// Returns an error if the session backend fails.
    pub async fn save_shipping(
        session: &Session,
        shipping: &ShippingSelection,
    ) -> Result<(), SessionError> {
        session.insert(keys::CHECKOUT_SHIPPING, shipping).await?;
        Ok(())
    }

    /// Forget both selections (after an order is placed).
    ///
    /// # Errors
    ///
    /// Returns an error if the session backend fails.
    pub async fn clear(session: &Session) -> Result<(), SessionError> {
        session.remove_value(keys::CHECKOUT_DISCOUNT).await?;
        session.remove_value(keys::CHECKOUT_SHIPPING).await?;
        Ok(())
    }

    /// Price breakdown for `cart` with these selections.
    #[must_use]
    pub fn summary(&self, cart: &CartState) -> CheckoutSummary {
        CheckoutSummary::compute(
            cart,
            self.discount.as_ref(),
            self.shipping.as_ref().map(|s| &s.quote),
        )
    }
}

/// Price breakdown shown at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CheckoutSummary {
    pub subtotal: Decimal,
    /// Amount taken off the subtotal (never more than the subtotal).
    pub discount: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

impl CheckoutSummary {
    #[must_use]
    pub fn compute(
        cart: &CartState,
        discount: Option<&Discount>,
        shipping: Option<&ShippingQuote>,
    ) -> Self {
        let subtotal = cart.total();
        let discount = discount.map_or(Decimal::ZERO, |d| discount_amount(d, subtotal));
        let shipping = shipping.map_or(Decimal::ZERO, |q| q.cost.max(Decimal::ZERO));
        let total = (subtotal - discount + shipping).max(Decimal::ZERO);

        Self {
            subtotal,
            discount,
            shipping,
            total,
        }
    }
}

fn discount_amount(discount: &Discount, subtotal: Decimal) -> Decimal {
    let raw = match discount.kind {
        DiscountKind::Percentage => {
            let pct = discount.value.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
            (subtotal * pct / Decimal::ONE_HUNDRED).round_dp(2)
        }
        DiscountKind::Fixed => discount.value.max(Decimal::ZERO),
    };
    raw.min(subtotal)
}
