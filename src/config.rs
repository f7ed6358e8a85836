//! Configuration
//!
//! An explicit configuration value object, created once and passed into
//! [`Cart::new`](crate::cart::Cart::new). The engine never consults ambient
//! state; everything tunable lives here.

use rust_decimal::Decimal;
use rusty_money::iso::{self, Currency};

use crate::rounding::round_amount;

/// Read-only settings consumed by cart and promotion arithmetic.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Default tax percent applied to new fees and by [`set_global_tax`](crate::cart::Cart::set_global_tax).
    pub tax_rate: Decimal,

    /// Number of decimal places every monetary amount is rounded to.
    pub decimals: u32,

    /// Allow more than one active coupon of the same type.
    pub allow_multiple_same_type_discount: bool,

    /// Include fee subtotals in the discountable base amount.
    pub discount_on_fees: bool,

    /// Compute per-unit coupon values from the tax-inclusive price.
    pub tax_item_before_discount: bool,

    /// Treat item prices as tax-inclusive (gross) instead of net.
    pub gross_price: bool,

    /// Fee `type` tag counted as shipping by [`shipping_float`](crate::cart::Cart::shipping_float).
    pub shipping_fee_type: String,

    /// Attribute key holding the shipping address.
    pub shipping_attribute: String,

    /// Option key flagging an item as eligible for member discounts.
    pub member_discountable_key: String,

    /// User-facing name for a coupon, used in conflict errors.
    pub coupon_label: String,

    /// Display currency for promotion descriptions.
    pub currency: &'static Currency,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::from(21),
            decimals: 2,
            allow_multiple_same_type_discount: false,
            discount_on_fees: false,
            tax_item_before_discount: false,
            gross_price: false,
            shipping_fee_type: "shipping".into(),
            shipping_attribute: "shipping".into(),
            member_discountable_key: "member_discountable".into(),
            coupon_label: "discount code".into(),
            currency: iso::MYR,
        }
    }
}

impl CartConfig {
    /// Round an amount to this configuration's decimal places.
    pub fn round(&self, value: Decimal) -> Decimal {
        round_amount(value, self.decimals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_shipped_settings() {
        let config = CartConfig::default();

        assert_eq!(config.tax_rate, Decimal::from(21));
        assert_eq!(config.decimals, 2);
        assert!(!config.allow_multiple_same_type_discount);
        assert!(!config.gross_price);
        assert_eq!(config.shipping_fee_type, "shipping");
    }

    #[test]
    fn round_uses_configured_decimals() {
        let config = CartConfig {
            decimals: 1,
            ..CartConfig::default()
        };

        assert_eq!(config.round(Decimal::new(149, 2)), Decimal::new(15, 1));
    }
}
