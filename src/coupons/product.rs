//! Product coupons
//!
//! A cart-level discount whose amount is derived from specific products in
//! the cart. Item rows are left untouched; only the totals see it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    cart::Cart,
    config::CartConfig,
    coupons::{CouponCore, CouponError, discountable::Discountable, per_item_value},
    item::CartItem,
};

/// Cart-level coupon over a product scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCoupon {
    core: CouponCore,
    product: Discountable,
    apply_once: bool,
}

impl ProductCoupon {
    /// Create a product coupon. With `apply_once` the discount counts only
    /// the cheapest eligible row once.
    pub fn new(core: CouponCore, product: Discountable, apply_once: bool) -> Self {
        Self {
            core,
            product,
            apply_once,
        }
    }

    /// Shared coupon data.
    pub fn core(&self) -> &CouponCore {
        &self.core
    }

    /// The product scope.
    pub fn product(&self) -> &Discountable {
        &self.product
    }

    /// Whether the discount is charged once per order.
    pub fn is_apply_once(&self) -> bool {
        self.apply_once
    }

    pub(crate) fn validate(&self) -> Result<(), CouponError> {
        self.core.validate_window()
    }

    pub(crate) fn discount(&self, cart: &Cart) -> Result<Decimal, CouponError> {
        self.validate()?;

        let config = cart.config();

        let eligible: Vec<&CartItem> = cart
            .items()
            .iter()
            .filter(|item| self.product.ids().matches(item.id()))
            .collect();

        if eligible.is_empty() {
            return Err(CouponError::NoEligibleItems(
                self.product.description().to_owned(),
            ));
        }

        if self.apply_once {
            let cheapest = eligible
                .iter()
                .min_by(|a, b| a.price_tax(config).cmp(&b.price_tax(config)));

            return Ok(cheapest.map_or(Decimal::ZERO, |item| {
                per_item_value(&self.core, item, config)
            }));
        }

        let amount = eligible.iter().fold(Decimal::ZERO, |acc, item| {
            acc + item.qty() * per_item_value(&self.core, item, config)
        });

        Ok(amount)
    }

    pub(crate) fn describe(&self, config: &CartConfig) -> String {
        let mut description = format!(
            "{} off for {}",
            self.core.display_value(config),
            self.product.description()
        );

        if self.apply_once {
            description.push_str(" (once per order)");
        }

        description
    }
}
