//! Money amounts and their display formatting.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    #[serde(default)]
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Format for display, e.g. `$19.99` or `€7.50`.
    #[must_use]
    pub fn display(&self) -> String {
        format_with_symbol(self.amount, self.currency_code.symbol())
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    ARS,
}

impl CurrencyCode {
    /// Display symbol for the currency.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::USD | Self::ARS => "$",
            Self::EUR => "€",
        }
    }
}

/// Format an amount in the store currency, e.g. `$100.00`.
///
/// Amounts are rounded half-away-from-zero to two decimal places; negative
/// amounts (discount lines) render as `-$5.00`.
#[must_use]
pub fn format_money(amount: Decimal) -> String {
    format_with_symbol(amount, CurrencyCode::default().symbol())
}

fn format_with_symbol(amount: Decimal, symbol: &str) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("-{symbol}{:.2}", rounded.abs())
    } else {
        format!("{symbol}{:.2}", rounded.abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_money_pads_decimals() {
        assert_eq!(format_money(Decimal::new(100, 0)), "$100.00");
        assert_eq!(format_money(Decimal::new(199, 1)), "$19.90");
    }

    #[test]
    fn test_format_money_rounds() {
        assert_eq!(format_money(Decimal::new(10_005, 3)), "$10.01");
        assert_eq!(format_money(Decimal::new(10_004, 3)), "$10.00");
    }

    #[test]
    fn test_format_money_negative() {
        assert_eq!(format_money(Decimal::new(-5, 0)), "-$5.00");
    }

    #[test]
    fn test_price_display_uses_currency_symbol() {
        let price = Price::new(Decimal::new(750, 2), CurrencyCode::EUR);
        assert_eq!(price.display(), "€7.50");
    }
}
