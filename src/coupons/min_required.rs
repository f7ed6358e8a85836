//! Minimum-requirement item coupons
//!
//! Item-level discounts gated on a minimum spend or minimum quantity across
//! the eligible rows.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    cart::Cart,
    config::CartConfig,
    coupons::{
        Coupon, CouponCore, CouponError,
        discountable::{MinRequiredDiscountable, RequiredSpend},
    },
    item::RowId,
};

/// Item-level coupon with a minimum-requirement gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinRequiredItemCoupon {
    core: CouponCore,
    discountable: MinRequiredDiscountable,
    apply_once: bool,
}

impl MinRequiredItemCoupon {
    /// Create a minimum-requirement item coupon.
    pub fn new(core: CouponCore, discountable: MinRequiredDiscountable, apply_once: bool) -> Self {
        Self {
            core,
            discountable,
            apply_once,
        }
    }

    /// Shared coupon data.
    pub fn core(&self) -> &CouponCore {
        &self.core
    }

    /// The gated product scope.
    pub fn discountable(&self) -> &MinRequiredDiscountable {
        &self.discountable
    }

    /// Whether a percentage discount touches only the cheapest row.
    pub fn is_apply_once(&self) -> bool {
        self.apply_once
    }

    fn eligible_rows(&self, cart: &Cart) -> Vec<RowId> {
        cart.items()
            .iter()
            .filter(|item| self.discountable.discountable().ids().matches(item.id()))
            .map(|item| item.row_id().clone())
            .collect()
    }

    pub(crate) fn validate(&self, cart: &Cart) -> Result<(), CouponError> {
        self.core.validate_window()?;

        let config = cart.config();

        let eligible: Vec<_> = cart
            .items()
            .iter()
            .filter(|item| self.discountable.discountable().ids().matches(item.id()))
            .collect();

        if eligible.is_empty() {
            return Err(CouponError::NoEligibleItems(
                self.discountable.discountable().description().to_owned(),
            ));
        }

        match self.discountable.spend_type() {
            RequiredSpend::Quantity => {
                let total_qty: Decimal = eligible.iter().map(|item| item.qty()).sum();
                let required = self.discountable.min_quantity().unwrap_or(Decimal::ZERO);

                if total_qty < required {
                    return Err(CouponError::RequirementsNotMet);
                }
            }
            RequiredSpend::Amount => {
                let total_amount: Decimal = eligible.iter().map(|item| item.total(config)).sum();
                let required = self.discountable.min_amount().unwrap_or(Decimal::ZERO);

                if total_amount < required {
                    return Err(CouponError::RequirementsNotMet);
                }
            }
        }

        Ok(())
    }

    pub(crate) fn apply(&self, cart: &mut Cart) -> Result<(), CouponError> {
        self.validate(cart)?;

        let rows = self.eligible_rows(cart);
        let config = cart.config().clone();

        if self.core.percentage_discount {
            if self.apply_once {
                // Only the cheapest eligible row receives the discount.
                let cheapest = rows
                    .iter()
                    .filter_map(|row_id| cart.items().iter().find(|item| item.row_id() == row_id))
                    .min_by(|a, b| a.price_tax(&config).cmp(&b.price_tax(&config)))
                    .map(|item| item.row_id().clone());

                if let Some(row_id) = cheapest {
                    self.attach(cart, &row_id)?;
                }
            } else {
                for row_id in &rows {
                    self.attach(cart, row_id)?;
                }
            }

            return Ok(());
        }

        // Fixed amount: divide evenly per eligible unit, unrounded; the row
        // totals round downstream.
        let total_qty: Decimal = rows
            .iter()
            .filter_map(|row_id| cart.items().iter().find(|item| item.row_id() == row_id))
            .map(crate::item::CartItem::qty)
            .sum();

        let per_unit = self.core.value.checked_div(total_qty).unwrap_or(Decimal::ZERO);

        for row_id in &rows {
            let attachment = Coupon::MinRequiredItem(self.clone());

            if let Some(item) = cart.item_mut(row_id) {
                item.set_discount(per_unit, false, self.apply_once)?;
                item.set_coupon(attachment);
            }
        }

        Ok(())
    }

    fn attach(&self, cart: &mut Cart, row_id: &RowId) -> Result<(), CouponError> {
        let attachment = Coupon::MinRequiredItem(self.clone());

        if let Some(item) = cart.item_mut(row_id) {
            item.set_discount(self.core.value, self.core.percentage_discount, self.apply_once)?;
            item.set_coupon(attachment);
        }

        Ok(())
    }

    pub(crate) fn forget(&self, cart: &mut Cart) {
        let rows = self.eligible_rows(cart);

        for row_id in &rows {
            if let Some(item) = cart.item_mut(row_id) {
                if item.has_coupon_code(&self.core.code) {
                    item.remove_coupon();
                }
            }
        }
    }

    pub(crate) fn discount(&self, cart: &Cart) -> Result<Decimal, CouponError> {
        self.core.validate_window()?;

        let config = cart.config();

        let total = cart
            .items()
            .iter()
            .filter(|item| item.has_coupon_code(&self.core.code))
            .fold(Decimal::ZERO, |acc, item| acc + item.discount_total(config));

        Ok(total)
    }

    pub(crate) fn describe(&self, config: &CartConfig) -> String {
        let gate = match self.discountable.spend_type() {
            RequiredSpend::Amount => format!(
                "minimum purchase amount {}",
                self.discountable
                    .min_amount()
                    .map_or_else(String::new, |amount| amount.normalize().to_string())
            ),
            RequiredSpend::Quantity => format!(
                "minimum quantity of {}",
                self.discountable
                    .min_quantity()
                    .map_or_else(String::new, |qty| qty.normalize().to_string())
            ),
        };

        format!(
            "{} off {} ({gate})",
            self.core.display_value(config),
            self.discountable.discountable().description()
        )
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::{
        coupons::discountable::{Discountable, DiscountableIds},
        fixtures,
    };

    use super::*;

    fn scope() -> Discountable {
        Discountable::new(DiscountableIds::of(["p1", "p2"]), "selected products")
    }

    #[test]
    fn quantity_gate_blocks_until_met() -> TestResult {
        let mut cart = fixtures::cart();
        fixtures::add_item(&mut cart, "p1", "One", 10, 2)?;

        let coupon = MinRequiredItemCoupon::new(
            CouponCore::new("MIN3", Decimal::TEN).percentage(),
            MinRequiredDiscountable::quantity(scope(), Decimal::from(3)),
            false,
        );

        assert_eq!(coupon.apply(&mut cart), Err(CouponError::RequirementsNotMet));

        fixtures::add_item(&mut cart, "p1", "One", 10, 1)?;
        coupon.apply(&mut cart)?;

        assert_eq!(coupon.discount(&cart)?, Decimal::from(3));

        Ok(())
    }

    #[test]
    fn amount_gate_measures_eligible_total() -> TestResult {
        let mut cart = fixtures::cart();
        fixtures::add_item(&mut cart, "p1", "One", 30, 1)?;

        let coupon = MinRequiredItemCoupon::new(
            CouponCore::new("SPEND50", Decimal::from(5)),
            MinRequiredDiscountable::amount(scope(), Decimal::from(50)),
            false,
        );

        assert_eq!(coupon.apply(&mut cart), Err(CouponError::RequirementsNotMet));

        fixtures::add_item(&mut cart, "p2", "Two", 25, 1)?;
        coupon.apply(&mut cart)?;

        // 5 split across 2 eligible units, charged per unit.
        assert_eq!(coupon.discount(&cart)?, Decimal::from(5));

        Ok(())
    }

    #[test]
    fn percentage_apply_once_hits_cheapest_row() -> TestResult {
        let mut cart = fixtures::cart();
        fixtures::add_item(&mut cart, "p1", "One", 30, 1)?;
        let cheap = fixtures::add_item(&mut cart, "p2", "Two", 10, 1)?;

        let coupon = MinRequiredItemCoupon::new(
            CouponCore::new("MIN2", Decimal::TEN).percentage(),
            MinRequiredDiscountable::quantity(scope(), Decimal::from(2)),
            true,
        );

        coupon.apply(&mut cart)?;

        assert!(cart.get(&cheap)?.has_coupon_code("MIN2"));
        assert_eq!(coupon.discount(&cart)?, Decimal::ONE);

        Ok(())
    }
}
