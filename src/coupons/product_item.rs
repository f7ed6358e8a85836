//! Product item coupons
//!
//! Discounts written directly onto eligible item rows. The coupon itself is
//! never recorded at cart level; it is rediscovered by scanning item
//! attachments.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    cart::Cart,
    config::CartConfig,
    coupons::{Coupon, CouponCore, CouponError, check_min_amount, discountable::Discountable},
    item::RowId,
};

/// Item-level coupon over a product scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductItemCoupon {
    core: CouponCore,
    discountable: Discountable,
    apply_once: bool,
    min_required_amount: Option<Decimal>,
}

impl ProductItemCoupon {
    /// Create a product item coupon.
    pub fn new(
        core: CouponCore,
        discountable: Discountable,
        apply_once: bool,
        min_required_amount: Option<Decimal>,
    ) -> Self {
        Self {
            core,
            discountable,
            apply_once,
            min_required_amount,
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

    /// Whether the discount is charged once per row instead of per unit.
    pub fn is_apply_once(&self) -> bool {
        self.apply_once
    }

    /// Minimum discountable base required, if any.
    pub fn min_required_amount(&self) -> Option<Decimal> {
        self.min_required_amount
    }

    pub(crate) fn validate(&self) -> Result<(), CouponError> {
        self.core.validate_window()
    }

    fn eligible_rows(&self, cart: &Cart) -> Vec<RowId> {
        cart.items()
            .iter()
            .filter(|item| self.discountable.ids().matches(item.id()))
            .map(|item| item.row_id().clone())
            .collect()
    }

    pub(crate) fn apply(&self, cart: &mut Cart) -> Result<(), CouponError> {
        self.validate()?;

        if let Some(min) = self.min_required_amount {
            check_min_amount(cart, min)?;
        }

        let rows = self.eligible_rows(cart);

        if rows.is_empty() {
            return Err(CouponError::NoEligibleItems(
                self.discountable.description().to_owned(),
            ));
        }

        if !self.core.percentage_discount && self.apply_once {
            self.apply_redistributed(cart, &rows)
        } else {
            self.apply_per_row(cart, &rows)
        }
    }

    // Fixed amount, once per order: split across eligible rows without an
    // existing coupon, weighted by unit price against the eligible total.
    fn apply_redistributed(&self, cart: &mut Cart, rows: &[RowId]) -> Result<(), CouponError> {
        let config = cart.config().clone();

        let total_amount: Decimal = rows
            .iter()
            .filter_map(|row_id| cart.items().iter().find(|item| item.row_id() == row_id))
            .map(|item| item.total(&config))
            .sum();

        for row_id in rows {
            let attachment = Coupon::ProductItem(self.clone());

            let Some(item) = cart.item_mut(row_id) else {
                continue;
            };

            if item.coupon().is_some() {
                continue;
            }

            let weight = item.price().checked_div(total_amount).unwrap_or(Decimal::ZERO);
            let share = config.round(weight * self.core.value);

            item.set_discount(share, false, true)?;
            item.set_coupon(attachment);
        }

        Ok(())
    }

    fn apply_per_row(&self, cart: &mut Cart, rows: &[RowId]) -> Result<(), CouponError> {
        let mut applied = 0u32;

        for row_id in rows {
            if self.apply_once && applied > 0 {
                break;
            }

            let attachment = Coupon::ProductItem(self.clone());

            let Some(item) = cart.item_mut(row_id) else {
                continue;
            };

            if item.coupon().is_some() {
                continue;
            }

            item.set_discount(self.core.value, self.core.percentage_discount, self.apply_once)?;
            item.set_coupon(attachment);
            applied += 1;
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
        self.validate()?;

        let config = cart.config();

        let total = cart
            .items()
            .iter()
            .filter(|item| item.has_coupon_code(&self.core.code))
            .fold(Decimal::ZERO, |acc, item| acc + item.discount_total(config));

        Ok(total)
    }

    pub(crate) fn describe(&self, config: &CartConfig) -> String {
        let mut description = format!(
            "{} off {}",
            self.core.display_value(config),
            self.discountable.description()
        );

        if self.apply_once {
            description.push_str(" (once per order)");
        }

        description
    }
}
