//! Items
//!
//! A cart line item: stable row identity, commercial attributes, promotion
//! attachments, and every derived monetary field. Derived fields are pure
//! functions of current state; nothing is cached between queries because
//! upstream rates can change between reads.
//!
//! Two mutually exclusive computation regimes exist, selected by
//! [`CartConfig::gross_price`]: net mode applies the tax rate on top of the
//! price, gross mode strips it out first. The regimes are intentionally
//! asymmetric; gross mode treats every rate as a percentage of the net price
//! and takes no zero floor.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use smallvec::SmallVec;
use std::fmt;
use thiserror::Error;

use crate::{
    catalog::Purchasable,
    config::CartConfig,
    coupons::Coupon,
    options::{AttributeValue, ItemOptions},
    rounding::percent_of,
    vouchers::VoucherAttachment,
};

/// Errors raised while constructing or mutating an item.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ItemError {
    /// Empty or otherwise unusable product identifier.
    #[error("please supply a valid identifier")]
    InvalidIdentifier,

    /// Empty name.
    #[error("please supply a valid name")]
    InvalidName,

    /// Negative price.
    #[error("please supply a valid price")]
    InvalidPrice,

    /// Negative weight.
    #[error("please supply a valid weight")]
    InvalidWeight,

    /// Empty fee type tag.
    #[error("please supply a valid type")]
    InvalidType,

    /// Quantity set to zero or below.
    #[error("please supply a valid quantity")]
    InvalidQuantity,

    /// Percentage discount outside `0..=100`.
    #[error("invalid value for a percentage discount; the value must be between 0 and 100")]
    InvalidDiscountValue,
}

/// Stable row identity: a content hash of `(id, normalised options)`.
///
/// Two additions of the same product with the same option set collapse to the
/// same row regardless of option insertion order. Any change to the id or the
/// options yields a different row id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowId(String);

impl RowId {
    pub(crate) fn generate(id: &str, options: &ItemOptions) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(id.as_bytes());
        hasher.update([0x00]);

        for (key, value) in options.iter() {
            hasher.update(key.as_bytes());
            hasher.update([0x1f]);
            hash_value(&mut hasher, value);
            hasher.update([0x1e]);
        }

        let digest = hasher.finalize();
        let hex: String = digest.iter().take(16).map(|byte| format!("{byte:02x}")).collect();

        Self(hex)
    }

    /// The row id as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Canonical, type-prefixed encoding; maps recurse in key order.
fn hash_value(hasher: &mut Sha256, value: &AttributeValue) {
    match value {
        AttributeValue::Bool(flag) => {
            hasher.update([b'b', u8::from(*flag)]);
        }
        AttributeValue::Number(number) => {
            hasher.update([b'n']);
            hasher.update(number.normalize().to_string().as_bytes());
        }
        AttributeValue::Text(text) => {
            hasher.update([b't']);
            hasher.update(text.as_bytes());
        }
        AttributeValue::Map(map) => {
            hasher.update([b'm']);
            for (key, nested) in map {
                hasher.update(key.as_bytes());
                hasher.update([0x1f]);
                hash_value(hasher, nested);
                hasher.update([0x1e]);
            }
        }
    }
}

/// Member discount attached to one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberAttachment {
    /// Member identifier.
    pub member_id: i64,

    /// Member display name.
    pub name: String,

    /// Discount rate: a percent when `percentage` is set, an amount otherwise.
    pub rate: Decimal,

    /// Whether `rate` is a percentage.
    pub percentage: bool,
}

/// Partial update applied to an existing item row.
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    /// New product identifier.
    pub id: Option<String>,

    /// New display name.
    pub name: Option<String>,

    /// New quantity.
    pub qty: Option<Decimal>,

    /// New unit price.
    pub price: Option<Decimal>,

    /// New unit weight.
    pub weight: Option<Decimal>,

    /// Replacement option set.
    pub options: Option<ItemOptions>,
}

/// One line entry in the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    row_id: RowId,
    id: String,
    name: String,
    qty: Decimal,
    price: Decimal,
    weight: Decimal,
    tax_rate: Decimal,
    tax_included: bool,
    options: ItemOptions,
    discount_rate: Decimal,
    percentage_discount: bool,
    discount_apply_once: bool,
    coupon: Option<Coupon>,
    member: Option<MemberAttachment>,
    vouchers: SmallVec<[VoucherAttachment; 2]>,
}

impl CartItem {
    /// Create an item with quantity 1 and no tax or discount state.
    ///
    /// # Errors
    ///
    /// Returns an [`ItemError`] when the identifier or name is empty, or the
    /// price or weight is negative.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        price: Decimal,
        weight: Decimal,
        options: ItemOptions,
    ) -> Result<Self, ItemError> {
        let id = id.into();
        let name = name.into();

        if id.is_empty() {
            return Err(ItemError::InvalidIdentifier);
        }
        if name.is_empty() {
            return Err(ItemError::InvalidName);
        }
        if price < Decimal::ZERO {
            return Err(ItemError::InvalidPrice);
        }
        if weight < Decimal::ZERO {
            return Err(ItemError::InvalidWeight);
        }

        let row_id = RowId::generate(&id, &options);

        Ok(Self {
            row_id,
            id,
            name,
            qty: Decimal::ONE,
            price,
            weight,
            tax_rate: Decimal::ZERO,
            tax_included: false,
            options,
            discount_rate: Decimal::ZERO,
            percentage_discount: false,
            discount_apply_once: false,
            coupon: None,
            member: None,
            vouchers: SmallVec::new(),
        })
    }

    /// Create an item from a catalog reference.
    ///
    /// # Errors
    ///
    /// Returns an [`ItemError`] when the resolved attributes are invalid.
    pub fn from_purchasable(
        product: &impl Purchasable,
        options: ItemOptions,
    ) -> Result<Self, ItemError> {
        Self::new(
            product.identifier(&options),
            product.name(&options),
            product.price(&options),
            product.weight(&options),
            options,
        )
    }

    /// The stable row identity.
    pub fn row_id(&self) -> &RowId {
        &self.row_id
    }

    /// The product identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The quantity on this row.
    pub fn qty(&self) -> Decimal {
        self.qty
    }

    /// The unit price.
    pub fn price(&self) -> Decimal {
        self.price
    }

    /// The unit weight.
    pub fn weight(&self) -> Decimal {
        self.weight
    }

    /// The tax percent applied to this row.
    pub fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    /// Whether the unit price already includes tax.
    pub fn tax_included(&self) -> bool {
        self.tax_included
    }

    /// The option set.
    pub fn options(&self) -> &ItemOptions {
        &self.options
    }

    /// The option set, mutably. Identity-affecting edits must go through
    /// [`apply_patch`](Self::apply_patch) instead so the row id stays honest.
    pub fn options_mut(&mut self) -> &mut ItemOptions {
        &mut self.options
    }

    /// The current discount rate (amount or percent).
    pub fn discount_rate(&self) -> Decimal {
        self.discount_rate
    }

    /// Whether the discount rate is a percentage.
    pub fn is_percentage_discount(&self) -> bool {
        self.percentage_discount
    }

    /// Whether the discount is charged once per row instead of per unit.
    pub fn is_discount_apply_once(&self) -> bool {
        self.discount_apply_once
    }

    /// The coupon attached to this row, if any.
    pub fn coupon(&self) -> Option<&Coupon> {
        self.coupon.as_ref()
    }

    /// Whether the attached coupon carries the given code.
    pub fn has_coupon_code(&self, code: &str) -> bool {
        self.coupon.as_ref().is_some_and(|coupon| coupon.code() == code)
    }

    /// The member discount attached to this row, if any.
    pub fn member(&self) -> Option<&MemberAttachment> {
        self.member.as_ref()
    }

    /// Voucher attachments on this row.
    pub fn vouchers(&self) -> &[VoucherAttachment] {
        &self.vouchers
    }

    /// Set the quantity.
    ///
    /// # Errors
    ///
    /// Returns [`ItemError::InvalidQuantity`] for zero or negative values;
    /// rows never hold non-positive quantities (the cart removes them).
    pub fn set_quantity(&mut self, qty: Decimal) -> Result<(), ItemError> {
        if qty <= Decimal::ZERO {
            return Err(ItemError::InvalidQuantity);
        }

        self.qty = qty;

        Ok(())
    }

    pub(crate) fn add_quantity(&mut self, qty: Decimal) {
        self.qty += qty;
    }

    /// Set the tax percent for this row.
    pub fn set_tax_rate(&mut self, tax_rate: Decimal) {
        self.tax_rate = tax_rate;
    }

    /// Mark the unit price as tax-inclusive or not.
    pub fn set_tax_included(&mut self, tax_included: bool) {
        self.tax_included = tax_included;
    }

    /// Apply a discount to this row.
    ///
    /// # Errors
    ///
    /// Returns [`ItemError::InvalidDiscountValue`] when a percentage discount
    /// lies outside `0..=100`.
    pub fn set_discount(
        &mut self,
        amount: Decimal,
        percentage: bool,
        apply_once: bool,
    ) -> Result<(), ItemError> {
        if percentage && !(Decimal::ZERO..=Decimal::ONE_HUNDRED).contains(&amount) {
            return Err(ItemError::InvalidDiscountValue);
        }

        self.percentage_discount = percentage;
        self.discount_apply_once = apply_once;
        self.discount_rate = amount;

        Ok(())
    }

    /// Attach a coupon to this row.
    pub fn set_coupon(&mut self, coupon: Coupon) {
        self.coupon = Some(coupon);
    }

    /// Detach the coupon, leaving the discount rate in place.
    pub fn forget_coupon(&mut self) {
        self.coupon = None;
    }

    /// Detach the coupon and reset the discount it granted.
    pub fn remove_coupon(&mut self) {
        self.discount_rate = Decimal::ZERO;
        self.coupon = None;
    }

    /// Attach a member discount to this row.
    ///
    /// # Errors
    ///
    /// Returns [`ItemError::InvalidDiscountValue`] when a percentage rate lies
    /// outside `0..=100`.
    pub fn set_member(&mut self, member: MemberAttachment) -> Result<(), ItemError> {
        if member.percentage
            && !(Decimal::ZERO..=Decimal::ONE_HUNDRED).contains(&member.rate)
        {
            return Err(ItemError::InvalidDiscountValue);
        }

        self.member = Some(member);

        Ok(())
    }

    /// Detach the member discount.
    pub fn remove_member(&mut self) {
        self.member = None;
    }

    /// Attach a voucher to this row. Vouchers stack; this is a list, not a slot.
    pub fn apply_voucher(&mut self, voucher: VoucherAttachment) {
        self.vouchers.push(voucher);
    }

    /// Remove every voucher with the given code.
    pub fn remove_voucher(&mut self, code: &str) {
        self.vouchers.retain(|voucher| voucher.code != code);
    }

    /// Apply a partial update and refresh the row identity.
    pub fn apply_patch(&mut self, patch: ItemPatch) {
        if let Some(id) = patch.id {
            self.id = id;
        }
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(qty) = patch.qty {
            self.qty = qty;
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(weight) = patch.weight {
            self.weight = weight;
        }
        if let Some(options) = patch.options {
            self.options = options;
        }

        self.row_id = RowId::generate(&self.id, &self.options);
    }

    /// Clone this row under a fresh row id, keeping the visible identity.
    ///
    /// Used when a promotion splits a row so part of its quantity can carry a
    /// different discount.
    pub fn duplicate(&self, salt: &str) -> Self {
        let mut clone = self.clone();
        let salted = format!("{}-{salt}", self.id);
        clone.row_id = RowId::generate(&salted, &self.options);

        clone
    }

    // ------------------------------------------------------------------
    // Derived monetary fields.
    // ------------------------------------------------------------------

    /// Unit price with the embedded tax stripped out (gross regime).
    pub fn price_net(&self, config: &CartConfig) -> Decimal {
        let divisor = Decimal::ONE + self.tax_rate / Decimal::ONE_HUNDRED;

        config.round(self.price.checked_div(divisor).unwrap_or(Decimal::ZERO))
    }

    /// Member discount per unit.
    pub fn member_discount(&self, config: &CartConfig) -> Decimal {
        if config.gross_price {
            // Gross regime: rate is always treated as a percent of the net
            // price and the result is not floored at zero.
            let rate = self.member.as_ref().map_or(Decimal::ZERO, |member| member.rate);

            return percent_of(rate, self.price_net(config));
        }

        match &self.member {
            None => Decimal::ZERO,
            Some(member) if member.percentage => percent_of(member.rate, self.price),
            Some(member) => member.rate,
        }
    }

    /// Plain discount per unit, computed after the member layer.
    pub fn discount(&self, config: &CartConfig) -> Decimal {
        if config.gross_price {
            return percent_of(self.discount_rate, self.price_net(config));
        }

        let base = self.price - self.member_discount(config);

        if self.percentage_discount {
            percent_of(self.discount_rate, base)
        } else {
            base.min(self.discount_rate)
        }
    }

    /// Unit price after the member discount, floored at zero.
    pub fn price_member(&self, config: &CartConfig) -> Decimal {
        if config.gross_price {
            // Not defined in the gross regime; percentage vouchers therefore
            // contribute nothing there.
            return Decimal::ZERO;
        }

        (self.price - self.member_discount(config)).max(Decimal::ZERO)
    }

    /// Sum of all voucher discounts on this row.
    pub fn vouchers_discount_amount(&self, config: &CartConfig) -> Decimal {
        self.vouchers.iter().fold(Decimal::ZERO, |acc, voucher| {
            acc + self.voucher_unit_amount(voucher, config) * voucher.discount_quantity
        })
    }

    /// Per-unit discount of the voucher with the given code, before the
    /// quantity multiplier.
    pub fn voucher_discount_amount(&self, code: &str, config: &CartConfig) -> Decimal {
        self.vouchers
            .iter()
            .find(|voucher| voucher.code == code)
            .map_or(Decimal::ZERO, |voucher| self.voucher_unit_amount(voucher, config))
    }

    /// Total discount of the voucher with the given code on this row.
    pub fn voucher_total_discount_amount(&self, code: &str, config: &CartConfig) -> Decimal {
        self.vouchers
            .iter()
            .find(|voucher| voucher.code == code)
            .map_or(Decimal::ZERO, |voucher| {
                self.voucher_unit_amount(voucher, config) * voucher.discount_quantity
            })
    }

    /// Total discounted quantity across all vouchers on this row.
    pub fn vouchers_total_discount_quantity(&self) -> Decimal {
        self.vouchers
            .iter()
            .fold(Decimal::ZERO, |acc, voucher| acc + voucher.discount_quantity)
    }

    fn voucher_unit_amount(&self, voucher: &VoucherAttachment, config: &CartConfig) -> Decimal {
        if voucher.percentage {
            percent_of(voucher.value, self.price_member(config))
        } else {
            voucher.value
        }
    }

    /// Member discount for the whole row, rounded.
    pub fn member_discount_total(&self, config: &CartConfig) -> Decimal {
        config.round(self.member_discount(config) * self.qty)
    }

    /// Plain discount for the whole row, rounded.
    ///
    /// Honours apply-once semantics: the discount value is charged once per
    /// row instead of per unit.
    pub fn discount_total(&self, config: &CartConfig) -> Decimal {
        if config.gross_price {
            return config.round(self.discount(config) * self.qty)
                + self.member_discount_total(config);
        }

        let multiplier = if self.discount_apply_once {
            Decimal::ONE
        } else {
            self.qty
        };

        config.round(self.discount(config) * multiplier)
    }

    /// Voucher discount for the whole row.
    pub fn voucher_discount_total(&self, config: &CartConfig) -> Decimal {
        self.vouchers_discount_amount(config)
    }

    /// Every discount layer combined: plain + member + voucher.
    pub fn all_discount_total(&self, config: &CartConfig) -> Decimal {
        self.discount_total(config)
            + self.member_discount_total(config)
            + self.voucher_discount_total(config)
    }

    /// Undiscounted row price, rounded.
    pub fn price_total(&self, config: &CartConfig) -> Decimal {
        if config.gross_price {
            config.round(self.price_net(config) * self.qty)
        } else {
            config.round(self.price * self.qty)
        }
    }

    /// Row price after all discounts, never negative in the net regime.
    pub fn subtotal(&self, config: &CartConfig) -> Decimal {
        if config.gross_price {
            return config.round(self.price_total(config) - self.discount_total(config));
        }

        config
            .round(self.price_total(config) - self.all_discount_total(config))
            .max(Decimal::ZERO)
    }

    /// Effective unit price after all discounts.
    pub fn price_target(&self, config: &CartConfig) -> Decimal {
        let reduction = if config.gross_price {
            self.discount_total(config)
        } else {
            self.all_discount_total(config)
        };

        let base = (self.price_total(config) - reduction)
            .checked_div(self.qty)
            .unwrap_or(Decimal::ZERO);

        if config.gross_price {
            config.round(base)
        } else {
            config.round(base).max(Decimal::ZERO)
        }
    }

    /// Tax per unit, derived from the effective unit price.
    pub fn tax(&self, config: &CartConfig) -> Decimal {
        let target = self.price_target(config);

        if config.gross_price {
            return config.round(percent_of(self.tax_rate, target));
        }

        let amount = if self.tax_included {
            // Tax-inclusive extraction: the portion of the target that is tax.
            target
                .checked_div(Decimal::ONE_HUNDRED + self.tax_rate)
                .unwrap_or(Decimal::ZERO)
                * self.tax_rate
        } else {
            percent_of(self.tax_rate, target)
        };

        config.round(amount)
    }

    /// Tax for the whole row, derived from the subtotal.
    pub fn tax_total(&self, config: &CartConfig) -> Decimal {
        config.round(percent_of(self.tax_rate, self.subtotal(config)))
    }

    /// Effective unit price including tax.
    pub fn price_tax(&self, config: &CartConfig) -> Decimal {
        let target = self.price_target(config);

        if config.gross_price {
            return config.round(target + self.tax(config));
        }

        let amount = if self.tax_included {
            target
        } else {
            target + self.tax(config)
        };

        config.round(amount)
    }

    /// Row total: subtotal plus tax.
    pub fn total(&self, config: &CartConfig) -> Decimal {
        config.round(self.subtotal(config) + self.tax_total(config))
    }

    /// Weight for the whole row, rounded.
    pub fn weight_total(&self, config: &CartConfig) -> Decimal {
        config.round(self.weight * self.qty)
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn config() -> CartConfig {
        CartConfig::default()
    }

    fn item(price: Decimal, qty: i64) -> TestResult<CartItem> {
        let mut item = CartItem::new("p1", "Product One", price, Decimal::ZERO, ItemOptions::new())?;
        item.set_quantity(Decimal::from(qty))?;

        Ok(item)
    }

    #[test]
    fn row_id_ignores_option_insertion_order() -> TestResult {
        let forward = ItemOptions::new().with("colour", "red").with("size", "xl");
        let reverse = ItemOptions::new().with("size", "xl").with("colour", "red");

        let a = CartItem::new("p1", "Product", Decimal::TEN, Decimal::ZERO, forward)?;
        let b = CartItem::new("p1", "Product", Decimal::TEN, Decimal::ZERO, reverse)?;

        assert_eq!(a.row_id(), b.row_id());

        Ok(())
    }

    #[test]
    fn row_id_changes_with_option_value() -> TestResult {
        let a = CartItem::new(
            "p1",
            "Product",
            Decimal::TEN,
            Decimal::ZERO,
            ItemOptions::new().with("colour", "red"),
        )?;
        let b = CartItem::new(
            "p1",
            "Product",
            Decimal::TEN,
            Decimal::ZERO,
            ItemOptions::new().with("colour", "blue"),
        )?;

        assert_ne!(a.row_id(), b.row_id());

        Ok(())
    }

    #[test]
    fn row_id_changes_with_id() -> TestResult {
        let a = CartItem::new("p1", "Product", Decimal::TEN, Decimal::ZERO, ItemOptions::new())?;
        let b = CartItem::new("p2", "Product", Decimal::TEN, Decimal::ZERO, ItemOptions::new())?;

        assert_ne!(a.row_id(), b.row_id());

        Ok(())
    }

    #[test]
    fn construction_rejects_invalid_input() {
        assert_eq!(
            CartItem::new("", "n", Decimal::ONE, Decimal::ZERO, ItemOptions::new()),
            Err(ItemError::InvalidIdentifier)
        );
        assert_eq!(
            CartItem::new("p", "", Decimal::ONE, Decimal::ZERO, ItemOptions::new()),
            Err(ItemError::InvalidName)
        );
        assert_eq!(
            CartItem::new("p", "n", Decimal::from(-1), Decimal::ZERO, ItemOptions::new()),
            Err(ItemError::InvalidPrice)
        );
        assert_eq!(
            CartItem::new("p", "n", Decimal::ONE, Decimal::from(-1), ItemOptions::new()),
            Err(ItemError::InvalidWeight)
        );
    }

    #[test]
    fn quantity_must_be_positive() -> TestResult {
        let mut item = item(Decimal::TEN, 1)?;

        assert_eq!(item.set_quantity(Decimal::ZERO), Err(ItemError::InvalidQuantity));
        assert_eq!(
            item.set_quantity(Decimal::from(-2)),
            Err(ItemError::InvalidQuantity)
        );

        Ok(())
    }

    #[test]
    fn percentage_discount_range_is_validated() -> TestResult {
        let mut item = item(Decimal::TEN, 1)?;

        assert_eq!(
            item.set_discount(Decimal::from(101), true, false),
            Err(ItemError::InvalidDiscountValue)
        );
        assert_eq!(
            item.set_discount(Decimal::from(-1), true, false),
            Err(ItemError::InvalidDiscountValue)
        );

        // Fixed amounts above the price are legal; the floor handles them.
        item.set_discount(Decimal::from(1000), false, false)?;

        Ok(())
    }

    #[test]
    fn fixed_discount_multiplies_by_quantity() -> TestResult {
        let config = config();
        let mut item = item(Decimal::TEN, 2)?;
        item.set_discount(Decimal::from(3), false, false)?;

        assert_eq!(item.discount_total(&config), Decimal::from(6));
        assert_eq!(item.subtotal(&config), Decimal::from(14));

        Ok(())
    }

    #[test]
    fn apply_once_discount_charges_a_single_unit() -> TestResult {
        let config = config();
        let mut item = item(Decimal::TEN, 2)?;
        item.set_discount(Decimal::from(3), false, true)?;

        assert_eq!(item.discount_total(&config), Decimal::from(3));
        assert_eq!(item.subtotal(&config), Decimal::from(17));

        Ok(())
    }

    #[test]
    fn net_mode_tax_on_top_of_price() -> TestResult {
        let config = config();
        let mut item = item(Decimal::from(100), 1)?;
        item.set_tax_rate(Decimal::from(21));

        assert_eq!(item.tax(&config), Decimal::from(21));
        assert_eq!(item.tax_total(&config), Decimal::from(21));
        assert_eq!(item.total(&config), Decimal::from(121));

        Ok(())
    }

    #[test]
    fn tax_included_extracts_from_target() -> TestResult {
        let config = config();
        let mut item = item(Decimal::from(121), 1)?;
        item.set_tax_rate(Decimal::from(21));
        item.set_tax_included(true);

        assert_eq!(item.tax(&config), Decimal::from(21));
        assert_eq!(item.price_tax(&config), Decimal::from(121));

        Ok(())
    }

    #[test]
    fn subtotal_never_negative() -> TestResult {
        let config = config();
        let mut item = item(Decimal::from(5), 1)?;
        item.set_discount(Decimal::from(50), false, false)?;

        assert_eq!(item.subtotal(&config), Decimal::ZERO);
        assert_eq!(item.price_target(&config), Decimal::ZERO);

        Ok(())
    }

    #[test]
    fn total_is_subtotal_plus_tax_in_both_regimes() -> TestResult {
        for gross in [false, true] {
            let config = CartConfig {
                gross_price: gross,
                ..CartConfig::default()
            };

            let mut item = item(Decimal::from(100), 3)?;
            item.set_tax_rate(Decimal::from(6));
            item.set_discount(Decimal::from(10), !gross, false)?;

            assert_eq!(
                item.total(&config),
                config.round(item.subtotal(&config) + item.tax_total(&config)),
                "gross={gross}"
            );
        }

        Ok(())
    }

    #[test]
    fn member_layer_feeds_discount_base() -> TestResult {
        let config = config();
        let mut item = item(Decimal::from(100), 1)?;
        item.set_member(MemberAttachment {
            member_id: 7,
            name: "Gold".into(),
            rate: Decimal::from(10),
            percentage: true,
        })?;
        item.set_discount(Decimal::from(50), true, false)?;

        // Member takes 10, then 50% of the remaining 90.
        assert_eq!(item.member_discount(&config), Decimal::from(10));
        assert_eq!(item.discount(&config), Decimal::from(45));
        assert_eq!(item.all_discount_total(&config), Decimal::from(55));
        assert_eq!(item.subtotal(&config), Decimal::from(45));

        Ok(())
    }

    #[test]
    fn fixed_discount_clamps_to_member_adjusted_price() -> TestResult {
        let config = config();
        let mut item = item(Decimal::from(20), 1)?;
        item.set_member(MemberAttachment {
            member_id: 1,
            name: "M".into(),
            rate: Decimal::from(5),
            percentage: false,
        })?;
        item.set_discount(Decimal::from(100), false, false)?;

        // min(price - memberDiscount, rate) = min(15, 100)
        assert_eq!(item.discount(&config), Decimal::from(15));

        Ok(())
    }

    #[test]
    fn voucher_amounts_layer_into_all_discount_total() -> TestResult {
        let config = config();
        let mut item = item(Decimal::from(40), 5)?;
        item.apply_voucher(VoucherAttachment {
            voucher_id: 9,
            code: "V9".into(),
            value: Decimal::from(10),
            percentage: true,
            discount_quantity: Decimal::from(2),
        });

        // 10% of 40, for two units.
        assert_eq!(item.voucher_discount_total(&config), Decimal::from(8));
        assert_eq!(item.voucher_total_discount_amount("V9", &config), Decimal::from(8));
        assert_eq!(item.voucher_discount_amount("V9", &config), Decimal::from(4));
        assert_eq!(item.all_discount_total(&config), Decimal::from(8));
        assert_eq!(item.subtotal(&config), Decimal::from(192));

        Ok(())
    }

    #[test]
    fn gross_mode_strips_tax_before_discounting() -> TestResult {
        let config = CartConfig {
            gross_price: true,
            ..CartConfig::default()
        };

        let mut item = item(Decimal::from(121), 1)?;
        item.set_tax_rate(Decimal::from(21));
        item.set_discount(Decimal::TEN, true, false)?;

        assert_eq!(item.price_net(&config), Decimal::from(100));
        assert_eq!(item.discount(&config), Decimal::TEN);
        assert_eq!(item.price_total(&config), Decimal::from(100));
        assert_eq!(item.subtotal(&config), Decimal::from(90));
        assert_eq!(item.price_target(&config), Decimal::from(90));
        assert_eq!(item.tax(&config), Decimal::new(1890, 2));
        assert_eq!(item.tax_total(&config), Decimal::new(1890, 2));
        assert_eq!(item.total(&config), Decimal::new(10890, 2));

        Ok(())
    }

    #[test]
    fn duplicate_keeps_identity_but_changes_row_id() -> TestResult {
        let item = item(Decimal::TEN, 3)?;
        let split = item.duplicate("1");

        assert_eq!(split.id(), item.id());
        assert_eq!(split.price(), item.price());
        assert_ne!(split.row_id(), item.row_id());

        Ok(())
    }

    #[test]
    fn patch_regenerates_row_id() -> TestResult {
        let mut item = item(Decimal::TEN, 1)?;
        let original = item.row_id().clone();

        item.apply_patch(ItemPatch {
            options: Some(ItemOptions::new().with("colour", "red")),
            ..ItemPatch::default()
        });

        assert_ne!(item.row_id(), &original);

        Ok(())
    }
}
