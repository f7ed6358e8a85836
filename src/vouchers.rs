//! Vouchers
//!
//! Quantity-capped, per-item discount instruments. Vouchers sit outside the
//! coupon hierarchy: several can stack on one row, and they layer into
//! [`all_discount_total`](crate::item::CartItem::all_discount_total) above
//! member and coupon discounts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::CartConfig,
    coupons::discountable::DiscountableIds,
    item::CartItem,
};

/// Errors raised while applying a voucher.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VoucherError {
    /// The cart holds no rows from the voucher's discountable set.
    #[error("the cart does not contain items from {0}")]
    NoEligibleItems(String),

    /// Every eligible row was skipped; nothing received the discount.
    #[error("no eligible items found for voucher discount")]
    NothingApplied,
}

/// The set of products a voucher may discount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherDiscountable {
    ids: DiscountableIds,
    description: String,
}

impl VoucherDiscountable {
    /// Create a discountable scope from an id set and a description.
    pub fn new(ids: DiscountableIds, description: impl Into<String>) -> Self {
        Self {
            ids,
            description: description.into(),
        }
    }

    /// The eligible product ids.
    pub fn ids(&self) -> &DiscountableIds {
        &self.ids
    }

    /// Human-readable description of the scope.
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// A voucher applied per item row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemVoucher {
    voucher_id: i64,
    code: String,
    value: Decimal,
    percentage_discount: bool,
    apply_quantity: Decimal,
    discountable: VoucherDiscountable,
}

impl ItemVoucher {
    /// Create a voucher.
    ///
    /// `apply_quantity` caps how many item units in total may receive the
    /// discount across all eligible rows.
    pub fn new(
        voucher_id: i64,
        code: impl Into<String>,
        value: Decimal,
        percentage_discount: bool,
        apply_quantity: Decimal,
        discountable: VoucherDiscountable,
    ) -> Self {
        Self {
            voucher_id,
            code: code.into(),
            value,
            percentage_discount,
            apply_quantity,
            discountable,
        }
    }

    /// Numeric voucher identifier.
    pub fn voucher_id(&self) -> i64 {
        self.voucher_id
    }

    /// The voucher code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The nominal discount value (percent or amount).
    pub fn value(&self) -> Decimal {
        self.value
    }

    /// Whether the value is a percentage.
    pub fn is_percentage(&self) -> bool {
        self.percentage_discount
    }

    /// The cap on discounted units.
    pub fn apply_quantity(&self) -> Decimal {
        self.apply_quantity
    }

    /// Single-unit cap: the fixed amount is redistributed proportionally.
    pub fn is_apply_once(&self) -> bool {
        self.apply_quantity == Decimal::ONE
    }

    /// The discountable scope.
    pub fn discountable(&self) -> &VoucherDiscountable {
        &self.discountable
    }

    /// Human-readable description.
    pub fn describe(&self) -> String {
        format!("{} x {}", self.apply_quantity, self.discountable.description())
    }

    /// Attach this voucher to every eligible row, clamping the discounted
    /// quantity to what remains of the cap.
    ///
    /// # Errors
    ///
    /// - [`VoucherError::NoEligibleItems`] when no row matches the scope.
    /// - [`VoucherError::NothingApplied`] when the cap left nothing to grant.
    pub(crate) fn apply_to_items(
        &self,
        items: &mut [CartItem],
        config: &CartConfig,
    ) -> Result<(), VoucherError> {
        let eligible: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, item)| self.discountable.ids.matches(item.id()))
            .map(|(index, _)| index)
            .collect();

        if eligible.is_empty() {
            return Err(VoucherError::NoEligibleItems(
                self.discountable.description.clone(),
            ));
        }

        let total_amount: Decimal = eligible
            .iter()
            .filter_map(|&index| items.get(index))
            .map(|item| item.total(config))
            .sum();

        let mut applied_rows = 0usize;

        if !self.percentage_discount && self.is_apply_once() {
            // Fixed amount, single-unit cap: split the value across eligible
            // rows weighted by unit price, one unit each. Each share rounds
            // independently; the residual error is accepted.
            for &index in &eligible {
                let Some(item) = items.get_mut(index) else {
                    continue;
                };

                let weight = item.price().checked_div(total_amount).unwrap_or(Decimal::ZERO);
                let share = config.round(weight * self.value);

                item.apply_voucher(VoucherAttachment {
                    voucher_id: self.voucher_id,
                    code: self.code.clone(),
                    value: share,
                    percentage: false,
                    discount_quantity: Decimal::ONE,
                });

                applied_rows += 1;
            }
        } else {
            let mut granted = Decimal::ZERO;

            for &index in &eligible {
                if granted >= self.apply_quantity {
                    break;
                }

                let Some(item) = items.get_mut(index) else {
                    continue;
                };

                let quantity = item.qty().min(self.apply_quantity - granted);

                if quantity <= Decimal::ZERO {
                    continue;
                }

                item.apply_voucher(VoucherAttachment {
                    voucher_id: self.voucher_id,
                    code: self.code.clone(),
                    value: self.value,
                    percentage: self.percentage_discount,
                    discount_quantity: quantity,
                });

                granted += quantity;
                applied_rows += 1;
            }
        }

        if applied_rows == 0 {
            return Err(VoucherError::NothingApplied);
        }

        Ok(())
    }
}

/// One voucher grant recorded on an item row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherAttachment {
    /// Identifier of the granting voucher.
    pub voucher_id: i64,

    /// Code of the granting voucher.
    pub code: String,

    /// Discount value for this row: the voucher's percent, or this row's
    /// share of a redistributed fixed amount.
    pub value: Decimal,

    /// Whether `value` is a percentage.
    pub percentage: bool,

    /// How many units on this row the discount covers. Clamped to the row
    /// quantity and the voucher's remaining allowance at apply time.
    pub discount_quantity: Decimal,
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::options::ItemOptions;

    use super::*;

    fn items() -> TestResult<Vec<CartItem>> {
        let mut a = CartItem::new("p1", "One", Decimal::from(40), Decimal::ZERO, ItemOptions::new())?;
        a.set_quantity(Decimal::from(5))?;

        let mut b = CartItem::new("p2", "Two", Decimal::from(10), Decimal::ZERO, ItemOptions::new())?;
        b.set_quantity(Decimal::from(2))?;

        Ok(vec![a, b])
    }

    fn scope(ids: &[&str]) -> VoucherDiscountable {
        VoucherDiscountable::new(DiscountableIds::of(ids.iter().copied()), "selected products")
    }

    #[test]
    fn quantity_cap_limits_discounted_units() -> TestResult {
        let config = CartConfig::default();
        let mut items = items()?;

        let voucher = ItemVoucher::new(
            1,
            "V1",
            Decimal::TEN,
            true,
            Decimal::from(2),
            scope(&["p1"]),
        );

        voucher.apply_to_items(&mut items, &config)?;

        let first = items.first().ok_or("missing row")?;

        // 10% of 40 for exactly two of the five units.
        assert_eq!(first.voucher_total_discount_amount("V1", &config), Decimal::from(8));
        assert_eq!(first.vouchers_total_discount_quantity(), Decimal::from(2));

        Ok(())
    }

    #[test]
    fn cap_spreads_across_rows() -> TestResult {
        let config = CartConfig::default();
        let mut items = items()?;

        let voucher = ItemVoucher::new(
            2,
            "V2",
            Decimal::from(2),
            false,
            Decimal::from(6),
            scope(&["p1", "p2"]),
        );

        voucher.apply_to_items(&mut items, &config)?;

        let first = items.first().ok_or("missing row")?;
        let second = items.get(1).ok_or("missing row")?;

        // Five units on the first row, the remaining unit on the second.
        assert_eq!(first.vouchers_total_discount_quantity(), Decimal::from(5));
        assert_eq!(second.vouchers_total_discount_quantity(), Decimal::ONE);

        Ok(())
    }

    #[test]
    fn fixed_apply_once_redistributes_proportionally() -> TestResult {
        let config = CartConfig::default();
        let mut items = items()?;

        let voucher = ItemVoucher::new(
            3,
            "V3",
            Decimal::from(10),
            false,
            Decimal::ONE,
            scope(&["p1", "p2"]),
        );

        voucher.apply_to_items(&mut items, &config)?;

        // Eligible total = 5*40 + 2*10 = 220; shares weight by unit price.
        let first = items.first().ok_or("missing row")?;
        let second = items.get(1).ok_or("missing row")?;

        assert_eq!(
            first.voucher_total_discount_amount("V3", &config),
            Decimal::new(182, 2)
        );
        assert_eq!(
            second.voucher_total_discount_amount("V3", &config),
            Decimal::new(45, 2)
        );

        Ok(())
    }

    #[test]
    fn no_matching_rows_is_an_error() -> TestResult {
        let config = CartConfig::default();
        let mut items = items()?;

        let voucher = ItemVoucher::new(
            4,
            "V4",
            Decimal::TEN,
            true,
            Decimal::from(2),
            scope(&["p9"]),
        );

        assert_eq!(
            voucher.apply_to_items(&mut items, &config),
            Err(VoucherError::NoEligibleItems("selected products".into()))
        );

        Ok(())
    }

    #[test]
    fn zero_cap_applies_nothing() -> TestResult {
        let config = CartConfig::default();
        let mut items = items()?;

        let voucher = ItemVoucher::new(
            5,
            "V5",
            Decimal::TEN,
            true,
            Decimal::ZERO,
            scope(&["p1"]),
        );

        assert_eq!(
            voucher.apply_to_items(&mut items, &config),
            Err(VoucherError::NothingApplied)
        );

        Ok(())
    }
}
