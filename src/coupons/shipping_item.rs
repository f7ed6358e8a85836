//! Shipping item coupons
//!
//! Grants a shipping discount by writing a `shipping_discount` option onto
//! eligible item rows, while the discount amount itself is still consulted at
//! cart level.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    cart::Cart,
    coupons::{CouponCore, CouponError, discountable::Discountable},
    item::RowId,
    options::SHIPPING_DISCOUNT,
};

/// Item-level free-shipping coupon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingItemCoupon {
    core: CouponCore,
    discountable: Discountable,
    max_shipping_value: Option<Decimal>,
}

impl ShippingItemCoupon {
    /// Create a shipping item coupon.
    pub fn new(
        core: CouponCore,
        discountable: Discountable,
        max_shipping_value: Option<Decimal>,
    ) -> Self {
        Self {
            core,
            discountable,
            max_shipping_value,
        }
    }

    /// Shared coupon data.
    pub fn core(&self) -> &CouponCore {
        &self.core
    }

    /// The product scope.
    pub fn discountable(&self) -> &Discountable {
        &self.discountable
    }

    /// Shipping cost ceiling, if any.
    pub fn max_shipping_value(&self) -> Option<Decimal> {
        self.max_shipping_value
    }

    fn eligible_rows(&self, cart: &Cart) -> Vec<RowId> {
        cart.items()
            .iter()
            .filter(|item| self.discountable.ids().matches(item.id()))
            .map(|item| item.row_id().clone())
            .collect()
    }

    pub(crate) fn validate(&self, cart: &Cart) -> Result<(), CouponError> {
        self.core.validate_window()?;

        if let Some(limit) = self.max_shipping_value {
            if cart.shipping_float() > limit {
                return Err(CouponError::ShippingLimitExceeded);
            }
        }

        if self.eligible_rows(cart).is_empty() {
            return Err(CouponError::NoEligibleItems(
                self.discountable.description().to_owned(),
            ));
        }

        Ok(())
    }

    pub(crate) fn apply(&self, cart: &mut Cart) -> Result<(), CouponError> {
        self.validate(cart)?;

        let rows = self.eligible_rows(cart);

        for row_id in &rows {
            if let Some(item) = cart.item_mut(row_id) {
                let shipping_cost = item.options().shipping_cost();

                item.options_mut().insert(SHIPPING_DISCOUNT, shipping_cost);
            }
        }

        Ok(())
    }

    pub(crate) fn forget(&self, cart: &mut Cart) {
        let rows = self.eligible_rows(cart);

        for row_id in &rows {
            if let Some(item) = cart.item_mut(row_id) {
                item.options_mut().remove(SHIPPING_DISCOUNT);
            }
        }
    }

    pub(crate) fn discount(&self, cart: &Cart) -> Result<Decimal, CouponError> {
        self.core.validate_window()?;

        Ok(cart.item_shippings_float())
    }

    pub(crate) fn describe(&self) -> String {
        let destinations = self.discountable.description();

        if destinations.is_empty() {
            "Free shipping".to_owned()
        } else {
            format!("Free shipping to {destinations}")
        }
    }
}
