//! Order coupons
//!
//! A flat or percentage discount on the cart's discountable base, recorded at
//! cart level and consulted by the totals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    cart::Cart,
    config::CartConfig,
    coupons::{CouponCore, CouponError, check_min_amount},
    rounding::{display_amount, percent_of},
};

/// Order-amount coupon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCoupon {
    core: CouponCore,
    min_order_value: Option<Decimal>,
}

impl OrderCoupon {
    /// Create an order coupon, optionally gated on a minimum order value.
    pub fn new(core: CouponCore, min_order_value: Option<Decimal>) -> Self {
        Self {
            core,
            min_order_value,
        }
    }

    /// Shared coupon data.
    pub fn core(&self) -> &CouponCore {
        &self.core
    }

    /// The minimum order value gate, if any.
    pub fn min_order_value(&self) -> Option<Decimal> {
        self.min_order_value
    }

    pub(crate) fn validate(&self, cart: &Cart) -> Result<(), CouponError> {
        self.core.validate_window()?;

        if let Some(min) = self.min_order_value {
            check_min_amount(cart, min)?;
        }

        Ok(())
    }

    pub(crate) fn discount(&self, cart: &Cart) -> Result<Decimal, CouponError> {
        self.validate(cart)?;

        let base = cart.discountable_float();

        let amount = if self.core.percentage_discount {
            percent_of(self.core.value, base)
        } else {
            self.core.value
        };

        Ok(amount)
    }

    pub(crate) fn describe(&self, config: &CartConfig) -> String {
        let value = self.core.display_value(config);

        match self.min_order_value {
            Some(min) => format!(
                "{value} off for orders above {}",
                display_amount(min, config.currency)
            ),
            None => format!("{value} off for all orders"),
        }
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::{config::CartConfig, fixtures};

    use super::*;

    #[test]
    fn percentage_discount_takes_cut_of_subtotal() -> TestResult {
        let mut cart = fixtures::cart();
        fixtures::add_item(&mut cart, "p1", "One", 100, 2)?;

        let coupon = OrderCoupon::new(CouponCore::new("TEN", Decimal::TEN).percentage(), None);

        assert_eq!(coupon.discount(&cart)?, Decimal::from(20));

        Ok(())
    }

    #[test]
    fn fixed_discount_is_face_value() -> TestResult {
        let mut cart = fixtures::cart();
        fixtures::add_item(&mut cart, "p1", "One", 100, 1)?;

        let coupon = OrderCoupon::new(CouponCore::new("FIVE", Decimal::from(5)), None);

        assert_eq!(coupon.discount(&cart)?, Decimal::from(5));

        Ok(())
    }

    #[test]
    fn min_order_value_gates_the_discount() -> TestResult {
        let mut cart = fixtures::cart();
        fixtures::add_item(&mut cart, "p1", "One", 10, 1)?;

        let coupon = OrderCoupon::new(
            CouponCore::new("BIG", Decimal::from(5)),
            Some(Decimal::from(50)),
        );

        assert_eq!(
            coupon.discount(&cart),
            Err(CouponError::MinAmountNotMet(Decimal::from(50)))
        );

        Ok(())
    }

    #[test]
    fn describe_names_the_gate() {
        let config = CartConfig::default();

        let gated = OrderCoupon::new(
            CouponCore::new("BIG", Decimal::TEN).percentage(),
            Some(Decimal::from(50)),
        );
        let open = OrderCoupon::new(CouponCore::new("ANY", Decimal::TEN).percentage(), None);

        assert!(gated.describe(&config).contains("orders above"));
        assert!(open.describe(&config).ends_with("all orders"));
    }
}
