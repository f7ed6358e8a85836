//! Buy-X-get-Y coupons
//!
//! The most intricate promotion: buying N units from a required group earns a
//! discount on M units from a discountable group. Eligible quantity is
//! counted across both groups (overlap deduplicated), broken into full-price
//! and discounted portions by pack arithmetic, and rows are split so the
//! discounted units can carry their own discount state.

use rust_decimal::Decimal;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::{
    cart::Cart,
    config::CartConfig,
    coupons::{Coupon, CouponCore, CouponError, discountable::BuyXGetYDiscountable},
    item::RowId,
};

/// Split an eligible quantity into full-price and discounted portions.
///
/// A pack is `required_qty + received_qty` units; whole packs earn their
/// received units, the remainder stays at full price.
pub fn quantity_breakdown(
    required_qty: Decimal,
    received_qty: Decimal,
    total_qty: Decimal,
) -> (Decimal, Decimal) {
    let pack = required_qty + received_qty;
    let packs = total_qty.checked_div(pack).unwrap_or(Decimal::ZERO).floor();
    let individual = total_qty.checked_rem(pack).unwrap_or(Decimal::ZERO);

    let full = required_qty * packs + individual;
    let discounted = total_qty - full;

    (full, discounted)
}

/// Buy-X-get-Y coupon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyXGetYCoupon {
    core: CouponCore,
    discountable: BuyXGetYDiscountable,
    apply_once: bool,
}

struct EligibleQuantities {
    required_rows: Vec<RowId>,
    discountable_rows: Vec<RowId>,
    required_qty: Decimal,
    discountable_qty: Decimal,
    total_eligible: Decimal,
}

impl BuyXGetYCoupon {
    /// Create a buy-X-get-Y coupon.
    pub fn new(core: CouponCore, discountable: BuyXGetYDiscountable, apply_once: bool) -> Self {
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

    /// The pack scope.
    pub fn discountable(&self) -> &BuyXGetYDiscountable {
        &self.discountable
    }

    /// Whether the discount value is charged once per row.
    pub fn is_apply_once(&self) -> bool {
        self.apply_once
    }

    fn quantities(&self, cart: &Cart) -> EligibleQuantities {
        let required_rows: Vec<RowId> = cart
            .items()
            .iter()
            .filter(|item| self.discountable.required_ids().matches(item.id()))
            .map(|item| item.row_id().clone())
            .collect();

        let discountable_rows: Vec<RowId> = cart
            .items()
            .iter()
            .filter(|item| self.discountable.discountable().ids().matches(item.id()))
            .map(|item| item.row_id().clone())
            .collect();

        let required_qty = sum_qty(cart, &required_rows);
        let discountable_qty = sum_qty(cart, &discountable_rows);

        // Units present in both groups must not be counted twice.
        let discountable_ids: FxHashSet<&str> = discountable_rows
            .iter()
            .filter_map(|row_id| cart.items().iter().find(|item| item.row_id() == row_id))
            .map(crate::item::CartItem::id)
            .collect();

        let intersect: Decimal = required_rows
            .iter()
            .filter_map(|row_id| cart.items().iter().find(|item| item.row_id() == row_id))
            .filter(|item| discountable_ids.contains(item.id()))
            .map(crate::item::CartItem::qty)
            .sum();

        let mut total_eligible = required_qty + discountable_qty - intersect;

        // Free-item eligibility cannot exceed what the required group can
        // fund on its own.
        if required_qty < discountable_qty {
            total_eligible = total_eligible.min(required_qty * Decimal::TWO);
        }

        EligibleQuantities {
            required_rows,
            discountable_rows,
            required_qty,
            discountable_qty,
            total_eligible,
        }
    }

    fn breakdown(&self, quantities: &EligibleQuantities) -> (Decimal, Decimal) {
        if self.discountable.min_required_amount().is_some() {
            // Spend-gated mode: the discounted portion is fixed.
            let received = self.discountable.receive_quantity();
            let full = (quantities.total_eligible - received).max(Decimal::ZERO);

            return (full, received);
        }

        quantity_breakdown(
            self.discountable.min_required_quantity(),
            self.discountable.receive_quantity(),
            quantities.total_eligible,
        )
    }

    pub(crate) fn validate(&self, cart: &Cart) -> Result<(), CouponError> {
        self.core.validate_window()?;

        let quantities = self.quantities(cart);
        let (full_qty, discount_qty) = self.breakdown(&quantities);

        if let Some(required_amount) = self.discountable.min_required_amount() {
            let config = cart.config();

            let required_price_tax: Decimal = quantities
                .required_rows
                .iter()
                .filter_map(|row_id| cart.items().iter().find(|item| item.row_id() == row_id))
                .map(|item| item.price_tax(config))
                .sum();

            if required_price_tax < required_amount {
                return Err(CouponError::RequirementsNotMet);
            }
        } else if quantities.required_qty + (quantities.discountable_qty - discount_qty)
            < full_qty
        {
            return Err(CouponError::RequirementsNotMet);
        }

        if discount_qty <= Decimal::ZERO {
            return Err(CouponError::NotEnoughQuantity);
        }

        Ok(())
    }

    pub(crate) fn apply(&self, cart: &mut Cart) -> Result<(), CouponError> {
        self.validate(cart)?;

        let quantities = self.quantities(cart);
        let (_, mut allotment) = self.breakdown(&quantities);

        for (index, row_id) in quantities.discountable_rows.iter().enumerate() {
            if allotment <= Decimal::ZERO {
                break;
            }

            let attachment = Coupon::BuyXGetY(self.clone());

            let Some(item) = cart.item_mut(row_id) else {
                continue;
            };

            let row_qty = item.qty();

            if allotment < row_qty {
                // Split the row: the discounted units move onto a fresh row,
                // the remainder stays at full price. The split is prepared
                // fully before the original row shrinks, so a failure leaves
                // the cart untouched.
                let mut split = item.duplicate(&format!("split-{index}"));

                split.set_quantity(allotment)?;
                split.set_discount(self.core.value, self.core.percentage_discount, self.apply_once)?;
                split.set_coupon(attachment);

                item.set_quantity(row_qty - allotment)?;

                cart.add_cart_item(split);

                allotment = Decimal::ZERO;
            } else {
                item.set_discount(self.core.value, self.core.percentage_discount, self.apply_once)?;
                item.set_coupon(attachment);

                allotment -= row_qty;
            }
        }

        merge_rows(cart);

        Ok(())
    }

    pub(crate) fn forget(&self, cart: &mut Cart) {
        let quantities = self.quantities(cart);

        if self.apply_once {
            let config = cart.config().clone();

            let cheapest = quantities
                .discountable_rows
                .iter()
                .filter_map(|row_id| cart.items().iter().find(|item| item.row_id() == row_id))
                .min_by(|a, b| a.price_tax(&config).cmp(&b.price_tax(&config)))
                .map(|item| item.row_id().clone());

            if let Some(row_id) = cheapest {
                if let Some(item) = cart.item_mut(&row_id) {
                    item.remove_coupon();
                }
            }

            return;
        }

        for row_id in &quantities.discountable_rows {
            if let Some(item) = cart.item_mut(row_id) {
                item.remove_coupon();
            }
        }
    }

    pub(crate) fn discount(&self, cart: &Cart) -> Result<Decimal, CouponError> {
        self.core.validate_window()?;

        let config = cart.config();

        let total = cart
            .items()
            .iter()
            .fold(Decimal::ZERO, |acc, item| acc + item.discount_total(config));

        Ok(total)
    }

    pub(crate) fn describe(&self, config: &CartConfig) -> String {
        let mut description = format!(
            "{} off for {}",
            self.core.display_value(config),
            self.discountable.discountable().description()
        );

        if self.apply_once {
            description.push_str(" (once per order)");
        }

        description
    }
}

fn sum_qty(cart: &Cart, rows: &[RowId]) -> Decimal {
    rows.iter()
        .filter_map(|row_id| cart.items().iter().find(|item| item.row_id() == row_id))
        .map(crate::item::CartItem::qty)
        .sum()
}

// Recombine rows that ended up with the same visible identity and coupon
// after splitting.
fn merge_rows(cart: &mut Cart) {
    let mut groups: FxHashMap<(String, String), Vec<RowId>> = FxHashMap::default();

    for item in cart.items() {
        let coupon_code = item
            .coupon()
            .map_or_else(String::new, |coupon| coupon.code().to_owned());

        groups
            .entry((item.id().to_owned(), coupon_code))
            .or_default()
            .push(item.row_id().clone());
    }

    for rows in groups.into_values() {
        let Some((first, rest)) = rows.split_first() else {
            continue;
        };

        if rest.is_empty() {
            continue;
        }

        let mut merged_qty = Decimal::ZERO;

        for row_id in rest {
            if let Some(item) = cart.take_item(row_id) {
                merged_qty += item.qty();
            }
        }

        if let Some(item) = cart.item_mut(first) {
            item.add_quantity(merged_qty);
        }
    }
}
