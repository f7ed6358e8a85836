//! Members
//!
//! A cart-scoped member discount: one non-stacking slot, layered beneath
//! coupon and voucher discounts. Eligibility is per item, flagged by a
//! configurable option key.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::CartConfig,
    item::{CartItem, ItemError, MemberAttachment},
};

/// Errors raised while applying a member discount.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemberError {
    /// The cart subtotal is below the member's minimum spend.
    #[error("member discount is only applicable for order value equal or above {0}")]
    MinAmountNotMet(Decimal),

    /// Invalid rate on an item attachment.
    #[error(transparent)]
    Item(#[from] ItemError),
}

/// A member whose tier grants a discount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartMember {
    member_id: i64,
    name: String,
    tier: String,
    discount_rate: Decimal,
    percentage_discount: bool,
    min_required_amount: Option<Decimal>,
}

impl CartMember {
    /// Create a member with a percentage or fixed-amount discount.
    pub fn new(
        member_id: i64,
        name: impl Into<String>,
        tier: impl Into<String>,
        discount_rate: Decimal,
        percentage_discount: bool,
        min_required_amount: Option<Decimal>,
    ) -> Self {
        Self {
            member_id,
            name: name.into(),
            tier: tier.into(),
            discount_rate,
            percentage_discount,
            min_required_amount,
        }
    }

    /// Member identifier.
    pub fn member_id(&self) -> i64 {
        self.member_id
    }

    /// Member display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Membership tier label.
    pub fn tier(&self) -> &str {
        &self.tier
    }

    /// The discount rate (percent or amount).
    pub fn discount_rate(&self) -> Decimal {
        self.discount_rate
    }

    /// Whether the rate is a percentage.
    pub fn is_percentage_discount(&self) -> bool {
        self.percentage_discount
    }

    /// Minimum cart subtotal required for the discount, if any.
    pub fn min_required_amount(&self) -> Option<Decimal> {
        self.min_required_amount
    }

    /// Attach this member's discount to every eligible item.
    ///
    /// Percentage rates apply uniformly. Fixed amounts are redistributed
    /// across eligible items weighted by unit price against the eligible
    /// total, each share rounded independently (the residual error is
    /// accepted).
    ///
    /// # Errors
    ///
    /// Returns [`MemberError::MinAmountNotMet`] when `subtotal` is below the
    /// minimum spend.
    pub(crate) fn apply_to_items(
        &self,
        items: &mut [CartItem],
        subtotal: Decimal,
        config: &CartConfig,
    ) -> Result<(), MemberError> {
        if let Some(min_amount) = self.min_required_amount {
            if subtotal < min_amount {
                return Err(MemberError::MinAmountNotMet(min_amount));
            }
        }

        // Reject a bad rate before touching any row.
        if self.percentage_discount
            && !(Decimal::ZERO..=Decimal::ONE_HUNDRED).contains(&self.discount_rate)
        {
            return Err(ItemError::InvalidDiscountValue.into());
        }

        let eligible: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.options().flag(&config.member_discountable_key))
            .map(|(index, _)| index)
            .collect();

        if eligible.is_empty() {
            return Ok(());
        }

        if self.percentage_discount {
            for &index in &eligible {
                if let Some(item) = items.get_mut(index) {
                    item.set_member(self.attachment(self.discount_rate))?;
                }
            }

            return Ok(());
        }

        let total_amount: Decimal = eligible
            .iter()
            .filter_map(|&index| items.get(index))
            .map(|item| item.total(config))
            .sum();

        for &index in &eligible {
            let Some(item) = items.get_mut(index) else {
                continue;
            };

            let weight = item.price().checked_div(total_amount).unwrap_or(Decimal::ZERO);
            let share = config.round(weight * self.discount_rate);

            item.set_member(self.attachment(share))?;
        }

        Ok(())
    }

    /// Clear this member's attachment from every item that carries one.
    pub(crate) fn forget_items(&self, items: &mut [CartItem]) {
        for item in items.iter_mut() {
            if item.member().is_some() {
                item.remove_member();
            }
        }
    }

    fn attachment(&self, rate: Decimal) -> MemberAttachment {
        MemberAttachment {
            member_id: self.member_id,
            name: self.name.clone(),
            rate,
            percentage: self.percentage_discount,
        }
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::options::ItemOptions;

    use super::*;

    fn eligible_item(id: &str, price: i64, qty: i64) -> TestResult<CartItem> {
        let options = ItemOptions::new().with("member_discountable", true);
        let mut item = CartItem::new(id, "Product", Decimal::from(price), Decimal::ZERO, options)?;
        item.set_quantity(Decimal::from(qty))?;

        Ok(item)
    }

    #[test]
    fn percentage_rate_applies_uniformly() -> TestResult {
        let config = CartConfig::default();
        let mut items = vec![eligible_item("p1", 100, 1)?, eligible_item("p2", 50, 2)?];

        let member = CartMember::new(1, "Ana", "gold", Decimal::TEN, true, None);
        member.apply_to_items(&mut items, Decimal::from(200), &config)?;

        for item in &items {
            let attachment = item.member().ok_or("missing attachment")?;
            assert_eq!(attachment.rate, Decimal::TEN);
            assert!(attachment.percentage);
        }

        Ok(())
    }

    #[test]
    fn fixed_amount_redistributes_by_unit_price() -> TestResult {
        let config = CartConfig::default();
        let mut items = vec![eligible_item("p1", 30, 1)?, eligible_item("p2", 10, 1)?];

        let member = CartMember::new(2, "Ben", "silver", Decimal::from(8), false, None);
        member.apply_to_items(&mut items, Decimal::from(40), &config)?;

        let first = items.first().ok_or("missing row")?.member().ok_or("missing")?;
        let second = items.get(1).ok_or("missing row")?.member().ok_or("missing")?;

        // Eligible total 40; shares 30/40 and 10/40 of the 8.
        assert_eq!(first.rate, Decimal::from(6));
        assert_eq!(second.rate, Decimal::from(2));

        Ok(())
    }

    #[test]
    fn min_spend_gate_blocks_application() -> TestResult {
        let config = CartConfig::default();
        let mut items = vec![eligible_item("p1", 10, 1)?];

        let member = CartMember::new(3, "Cy", "gold", Decimal::TEN, true, Some(Decimal::from(50)));

        assert_eq!(
            member.apply_to_items(&mut items, Decimal::from(10), &config),
            Err(MemberError::MinAmountNotMet(Decimal::from(50)))
        );
        assert!(items.iter().all(|item| item.member().is_none()));

        Ok(())
    }

    #[test]
    fn ineligible_items_are_skipped() -> TestResult {
        let config = CartConfig::default();
        let plain = CartItem::new("p3", "Plain", Decimal::TEN, Decimal::ZERO, ItemOptions::new())?;
        let mut items = vec![plain, eligible_item("p1", 10, 1)?];

        let member = CartMember::new(4, "Di", "gold", Decimal::from(5), true, None);
        member.apply_to_items(&mut items, Decimal::from(20), &config)?;

        assert!(items.first().ok_or("missing")?.member().is_none());
        assert!(items.get(1).ok_or("missing")?.member().is_some());

        Ok(())
    }

    #[test]
    fn forget_clears_attachments() -> TestResult {
        let config = CartConfig::default();
        let mut items = vec![eligible_item("p1", 10, 1)?];

        let member = CartMember::new(5, "Ed", "gold", Decimal::from(5), true, None);
        member.apply_to_items(&mut items, Decimal::from(10), &config)?;
        member.forget_items(&mut items);

        assert!(items.iter().all(|item| item.member().is_none()));

        Ok(())
    }
}
