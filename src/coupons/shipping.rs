//! Shipping coupons
//!
//! Cart-level discounts against the shipping total, optionally restricted to
//! a country allow-list and gated on minimum order requirements.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    cart::Cart,
    coupons::{
        CouponCore, CouponError,
        discountable::{MinRequiredShippingDiscountable, ShippingDiscountable},
    },
    rounding::percent_of,
};

/// Free- or discounted-shipping coupon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingCoupon {
    core: CouponCore,
    discountable: ShippingDiscountable,
    max_shipping_value: Option<Decimal>,
}

impl ShippingCoupon {
    /// Create a shipping coupon. `max_shipping_value` caps how expensive the
    /// shipping may be for the coupon to cover it.
    pub fn new(
        core: CouponCore,
        discountable: ShippingDiscountable,
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

    /// The country scope.
    pub fn discountable(&self) -> &ShippingDiscountable {
        &self.discountable
    }

    /// Shipping cost ceiling, if any.
    pub fn max_shipping_value(&self) -> Option<Decimal> {
        self.max_shipping_value
    }

    pub(crate) fn validate(&self) -> Result<(), CouponError> {
        self.core.validate_window()
    }

    // Shared shipping gates: cost ceiling and country allow-list.
    pub(crate) fn check_shipping(&self, cart: &Cart) -> Result<Decimal, CouponError> {
        let shipping_total = cart.shipping_float();

        if let Some(limit) = self.max_shipping_value {
            if shipping_total > limit {
                return Err(CouponError::ShippingLimitExceeded);
            }
        }

        if !self.discountable.allowed_countries().is_empty() {
            let Some(country) = cart.shipping_country_id() else {
                return Err(CouponError::InvalidShippingCountry);
            };

            if !self.discountable.allowed_countries().contains(&country) {
                return Err(CouponError::CountryNotAllowed(
                    self.discountable.description().to_owned(),
                ));
            }
        }

        Ok(shipping_total)
    }

    pub(crate) fn discount(&self, cart: &Cart) -> Result<Decimal, CouponError> {
        self.validate()?;

        self.check_shipping(cart)
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

/// Shipping coupon gated on minimum order amount or quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinRequiredShippingCoupon {
    core: CouponCore,
    discountable: MinRequiredShippingDiscountable,
    max_shipping_value: Option<Decimal>,
}

impl MinRequiredShippingCoupon {
    /// Create a gated shipping coupon.
    pub fn new(
        core: CouponCore,
        discountable: MinRequiredShippingDiscountable,
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

    /// The gated country scope.
    pub fn discountable(&self) -> &MinRequiredShippingDiscountable {
        &self.discountable
    }

    fn as_shipping(&self) -> ShippingCoupon {
        ShippingCoupon::new(
            self.core.clone(),
            self.discountable.shipping().clone(),
            self.max_shipping_value,
        )
    }

    pub(crate) fn validate(&self, cart: &Cart) -> Result<(), CouponError> {
        self.core.validate_window()?;

        let shipping_total = cart.shipping_float();

        if shipping_total <= Decimal::ZERO {
            return Err(CouponError::NoAmountToDiscount);
        }

        if let Some(min_amount) = self.discountable.min_amount() {
            if cart.items_total(false) < min_amount {
                return Err(CouponError::RequirementsNotMet);
            }
        }

        if let Some(min_quantity) = self.discountable.min_quantity() {
            if cart.count() < min_quantity {
                return Err(CouponError::RequirementsNotMet);
            }
        }

        self.as_shipping().check_shipping(cart)?;

        Ok(())
    }

    pub(crate) fn discount(&self, cart: &Cart) -> Result<Decimal, CouponError> {
        self.validate(cart)?;

        let shipping_total = cart.shipping_float();

        let amount = if self.core.percentage_discount {
            percent_of(self.core.value, shipping_total)
        } else {
            self.core.value
        };

        Ok(amount)
    }

    pub(crate) fn describe(&self) -> String {
        self.as_shipping().describe()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rust_decimal::Decimal;
    use testresult::TestResult;

    use crate::{
        fixtures,
        options::AttributeValue,
    };

    use super::*;

    fn shipping_address(country: &str) -> AttributeValue {
        let mut address = BTreeMap::new();
        address.insert("country_id".to_owned(), AttributeValue::from(country));

        let mut shipping = BTreeMap::new();
        shipping.insert("address".to_owned(), AttributeValue::Map(address));

        AttributeValue::Map(shipping)
    }

    #[test]
    fn discount_returns_the_shipping_total() -> TestResult {
        let mut cart = fixtures::cart();
        fixtures::add_shipped_item(&mut cart, "p1", "One", 50, 1, 8)?;

        let coupon = ShippingCoupon::new(
            CouponCore::new("FREESHIP", Decimal::ZERO),
            ShippingDiscountable::new(Vec::<String>::new(), ""),
            None,
        );

        assert_eq!(coupon.discount(&cart)?, Decimal::from(8));

        Ok(())
    }

    #[test]
    fn shipping_ceiling_blocks_expensive_orders() -> TestResult {
        let mut cart = fixtures::cart();
        fixtures::add_shipped_item(&mut cart, "p1", "One", 50, 1, 20)?;

        let coupon = ShippingCoupon::new(
            CouponCore::new("FREESHIP", Decimal::ZERO),
            ShippingDiscountable::new(Vec::<String>::new(), ""),
            Some(Decimal::TEN),
        );

        assert_eq!(coupon.discount(&cart), Err(CouponError::ShippingLimitExceeded));

        Ok(())
    }

    #[test]
    fn country_allow_list_is_enforced() -> TestResult {
        let mut cart = fixtures::cart();
        fixtures::add_shipped_item(&mut cart, "p1", "One", 50, 1, 8)?;

        let coupon = ShippingCoupon::new(
            CouponCore::new("MYSHIP", Decimal::ZERO),
            ShippingDiscountable::new(["MY", "SG"], "Malaysia and Singapore"),
            None,
        );

        // No address at all.
        assert_eq!(coupon.discount(&cart), Err(CouponError::InvalidShippingCountry));

        cart.add_attribute("shipping", shipping_address("TH"));
        assert_eq!(
            coupon.discount(&cart),
            Err(CouponError::CountryNotAllowed("Malaysia and Singapore".into()))
        );

        cart.add_attribute("shipping", shipping_address("MY"));
        assert_eq!(coupon.discount(&cart)?, Decimal::from(8));

        Ok(())
    }

    #[test]
    fn min_required_gates_and_percentage_value() -> TestResult {
        let mut cart = fixtures::cart();
        fixtures::add_shipped_item(&mut cart, "p1", "One", 30, 1, 10)?;

        let coupon = MinRequiredShippingCoupon::new(
            CouponCore::new("HALFSHIP", Decimal::from(50)).percentage(),
            MinRequiredShippingDiscountable::new(
                ShippingDiscountable::new(Vec::<String>::new(), ""),
                Some(Decimal::from(50)),
                None,
            ),
            None,
        );

        assert_eq!(coupon.discount(&cart), Err(CouponError::RequirementsNotMet));

        fixtures::add_item(&mut cart, "p2", "Two", 30, 1)?;

        assert_eq!(coupon.discount(&cart)?, Decimal::from(5));

        Ok(())
    }

    #[test]
    fn no_shipping_cost_means_nothing_to_discount() -> TestResult {
        let mut cart = fixtures::cart();
        fixtures::add_item(&mut cart, "p1", "One", 30, 1)?;

        let coupon = MinRequiredShippingCoupon::new(
            CouponCore::new("SHIP", Decimal::from(50)).percentage(),
            MinRequiredShippingDiscountable::new(
                ShippingDiscountable::new(Vec::<String>::new(), ""),
                None,
                None,
            ),
            None,
        );

        assert_eq!(coupon.discount(&cart), Err(CouponError::NoAmountToDiscount));

        Ok(())
    }
}
