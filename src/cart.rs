//! Cart
//!
//! The orchestrator: owns the item, fee, coupon, and attribute collections,
//! drives promotion validation and re-application on structural changes, and
//! derives every aggregate total as a pure reduction over live row state.
//! Nothing is cached; each query recomputes from the rows.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    catalog::Purchasable,
    config::CartConfig,
    coupons::{Coupon, CouponError},
    events::{CartEvent, EventSink, TracingSink},
    fee::{CartFee, FeePatch},
    item::{CartItem, ItemError, ItemPatch, RowId},
    member::{CartMember, MemberError},
    options::{AttributeValue, ItemOptions},
    store::{CartSnapshot, CartStore, StoreError},
    vouchers::{ItemVoucher, VoucherError},
};

/// Errors surfaced by cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// No row with the given id exists in the addressed collection.
    #[error("the cart does not contain row id {0}")]
    RowNotFound(RowId),

    /// Invalid item input or mutation.
    #[error(transparent)]
    Item(#[from] ItemError),

    /// Coupon validation or application failure.
    #[error(transparent)]
    Coupon(#[from] CouponError),

    /// Member discount failure.
    #[error(transparent)]
    Member(#[from] MemberError),

    /// Voucher application failure.
    #[error(transparent)]
    Voucher(#[from] VoucherError),

    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// An update to an existing item row.
#[derive(Debug, Clone)]
pub enum ItemUpdate {
    /// Replace the quantity. Zero or below removes the row.
    Quantity(Decimal),

    /// Apply a partial field update.
    Patch(ItemPatch),
}

/// An update to an existing fee row.
#[derive(Debug, Clone)]
pub enum FeeUpdate {
    /// Replace the quantity. Zero or below removes the row.
    Quantity(Decimal),

    /// Apply a partial field update.
    Patch(FeePatch),
}

/// A shopping cart instance.
///
/// A cart is a single logical actor: mutating operations read-modify-write
/// the whole collection state, so concurrent use requires one exclusive lock
/// per instance on the caller's side.
#[derive(Debug)]
pub struct Cart {
    instance: String,
    config: CartConfig,
    items: Vec<CartItem>,
    fees: Vec<CartFee>,
    coupons: BTreeMap<String, Coupon>,
    attributes: BTreeMap<String, AttributeValue>,
    member: Option<CartMember>,
    discount: Decimal,
    tax_rate: Decimal,
    events: Box<dyn EventSink>,
}

impl Cart {
    /// Name of the default cart instance.
    pub const DEFAULT_INSTANCE: &'static str = "default";

    /// Create an empty cart under the default instance name.
    pub fn new(config: CartConfig) -> Self {
        let tax_rate = config.tax_rate;

        Self {
            instance: Self::DEFAULT_INSTANCE.to_owned(),
            config,
            items: Vec::new(),
            fees: Vec::new(),
            coupons: BTreeMap::new(),
            attributes: BTreeMap::new(),
            member: None,
            discount: Decimal::ZERO,
            tax_rate,
            events: Box::new(TracingSink),
        }
    }

    /// Rename the cart instance, e.g. `"wishlist"`.
    #[must_use]
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = instance.into();
        self
    }

    /// The instance name.
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// The configuration this cart computes with.
    pub fn config(&self) -> &CartConfig {
        &self.config
    }

    /// Replace the event sink.
    pub fn set_event_sink(&mut self, events: Box<dyn EventSink>) {
        self.events = events;
    }

    fn emit(&self, event: CartEvent) {
        self.events.emit(&event);
    }

    // ------------------------------------------------------------------
    // Items.
    // ------------------------------------------------------------------

    /// The item rows, in insertion order.
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Number of item rows.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the cart holds no item rows.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total item quantity across all rows.
    pub fn count(&self) -> Decimal {
        self.items.iter().map(CartItem::qty).sum()
    }

    /// Build an item from raw attributes and add it.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] for invalid item input.
    pub fn add(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        qty: Decimal,
        price: Decimal,
        weight: Decimal,
        options: ItemOptions,
    ) -> Result<RowId, CartError> {
        let mut item = CartItem::new(id, name, price, weight, options)?;
        item.set_quantity(qty)?;

        Ok(self.add_cart_item(item))
    }

    /// Build an item from a catalog reference and add it.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] for invalid resolved attributes.
    pub fn add_purchasable(
        &mut self,
        product: &impl Purchasable,
        qty: Decimal,
        options: ItemOptions,
    ) -> Result<RowId, CartError> {
        let mut item = CartItem::from_purchasable(product, options)?;
        item.set_quantity(qty)?;

        Ok(self.add_cart_item(item))
    }

    /// Add a pre-built item. A row with the same row id merges by summing
    /// quantities; otherwise the item is inserted as a new row.
    pub fn add_cart_item(&mut self, item: CartItem) -> RowId {
        let row_id = item.row_id().clone();

        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|existing| existing.row_id() == &row_id)
        {
            existing.add_quantity(item.qty());
        } else {
            self.items.push(item);
        }

        self.emit(CartEvent::ItemAdded {
            row_id: row_id.clone(),
        });

        row_id
    }

    /// Look up an item row.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::RowNotFound`] when no such row exists.
    pub fn get(&self, row_id: &RowId) -> Result<&CartItem, CartError> {
        self.items
            .iter()
            .find(|item| item.row_id() == row_id)
            .ok_or_else(|| CartError::RowNotFound(row_id.clone()))
    }

    pub(crate) fn item_mut(&mut self, row_id: &RowId) -> Option<&mut CartItem> {
        self.items.iter_mut().find(|item| item.row_id() == row_id)
    }

    pub(crate) fn take_item(&mut self, row_id: &RowId) -> Option<CartItem> {
        let position = self.items.iter().position(|item| item.row_id() == row_id)?;

        Some(self.items.remove(position))
    }

    /// Filter item rows with a predicate.
    pub fn search<'a, F>(&'a self, predicate: F) -> impl Iterator<Item = &'a CartItem>
    where
        F: Fn(&CartItem) -> bool + 'a,
    {
        self.items.iter().filter(move |item| predicate(item))
    }

    /// Update an item row. Identity-affecting changes merge into an existing
    /// row with the new identity; a resulting quantity of zero or below
    /// removes the row. Returns the surviving row id, or `None` on removal.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::RowNotFound`] when no such row exists.
    pub fn update_item(
        &mut self,
        row_id: &RowId,
        update: ItemUpdate,
    ) -> Result<Option<RowId>, CartError> {
        let mut item = self
            .take_item(row_id)
            .ok_or_else(|| CartError::RowNotFound(row_id.clone()))?;

        match update {
            ItemUpdate::Quantity(qty) => item.apply_patch(ItemPatch {
                qty: Some(qty),
                ..ItemPatch::default()
            }),
            ItemUpdate::Patch(patch) => item.apply_patch(patch),
        }

        let new_row_id = item.row_id().clone();

        // Identity change landing on an existing row: fold quantities
        // together and keep one row.
        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|existing| existing.row_id() == &new_row_id)
        {
            item.add_quantity(existing.qty());
            *existing = item;
        } else {
            self.items.push(item);
        }

        let final_qty = self
            .get(&new_row_id)
            .map(CartItem::qty)
            .unwrap_or(Decimal::ZERO);

        if final_qty <= Decimal::ZERO {
            self.take_item(&new_row_id);
            self.emit(CartEvent::ItemRemoved {
                row_id: new_row_id.clone(),
            });
            self.validate_coupons();

            return Ok(None);
        }

        self.emit(CartEvent::ItemUpdated {
            row_id: new_row_id.clone(),
        });

        Ok(Some(new_row_id))
    }

    /// Remove an item row, then silently detach any cart-level coupon that is
    /// no longer eligible.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::RowNotFound`] when no such row exists.
    pub fn remove_item(&mut self, row_id: &RowId) -> Result<(), CartError> {
        let item = self
            .take_item(row_id)
            .ok_or_else(|| CartError::RowNotFound(row_id.clone()))?;

        self.validate_coupons();

        self.emit(CartEvent::ItemRemoved {
            row_id: item.row_id().clone(),
        });

        Ok(())
    }

    /// Remove every row, fee, coupon, and attribute.
    pub fn destroy(&mut self) {
        self.items.clear();
        self.fees.clear();
        self.coupons.clear();
        self.attributes.clear();
        self.member = None;
    }

    // ------------------------------------------------------------------
    // Per-row and global rates.
    // ------------------------------------------------------------------

    /// Set the tax rate of one item row.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::RowNotFound`] when no such row exists.
    pub fn set_tax(&mut self, row_id: &RowId, tax_rate: Decimal) -> Result<(), CartError> {
        let item = self
            .item_mut(row_id)
            .ok_or_else(|| CartError::RowNotFound(row_id.clone()))?;

        item.set_tax_rate(tax_rate);

        Ok(())
    }

    /// Set the tax rate for every item row and remember it as the cart
    /// default for new fees.
    pub fn set_global_tax(&mut self, tax_rate: Decimal) {
        self.tax_rate = tax_rate;

        for item in &mut self.items {
            item.set_tax_rate(tax_rate);
        }
    }

    /// Set the discount rate of one item row.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] when the row is missing or the rate invalid.
    pub fn set_discount_rate(
        &mut self,
        row_id: &RowId,
        discount: Decimal,
        percentage: bool,
        apply_once: bool,
    ) -> Result<(), CartError> {
        let item = self
            .item_mut(row_id)
            .ok_or_else(|| CartError::RowNotFound(row_id.clone()))?;

        item.set_discount(discount, percentage, apply_once)?;

        Ok(())
    }

    /// Set the discount rate for every item row and remember it as the cart
    /// default for new fees.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] when the rate is invalid.
    pub fn set_global_discount(
        &mut self,
        discount: Decimal,
        percentage: bool,
        apply_once: bool,
    ) -> Result<(), CartError> {
        self.discount = discount;

        for item in &mut self.items {
            item.set_discount(discount, percentage, apply_once)?;
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Fees.
    // ------------------------------------------------------------------

    /// The fee rows, in insertion order.
    pub fn fees(&self) -> &[CartFee] {
        &self.fees
    }

    /// Add a fee. Unlike items, fees never merge: a duplicate row id replaces
    /// the previous fee. Without the keep flags the fee inherits the cart's
    /// default discount and tax rate.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] when the inherited discount rate is invalid.
    pub fn add_fee(
        &mut self,
        mut fee: CartFee,
        keep_discount: bool,
        keep_tax: bool,
    ) -> Result<RowId, CartError> {
        if !keep_discount {
            fee.set_discount(self.discount, false, false)?;
        }
        if !keep_tax {
            fee.set_tax_rate(self.tax_rate);
        }

        let row_id = fee.row_id().clone();

        if let Some(existing) = self
            .fees
            .iter_mut()
            .find(|existing| existing.row_id() == &row_id)
        {
            *existing = fee;
        } else {
            self.fees.push(fee);
        }

        self.emit(CartEvent::FeeAdded {
            row_id: row_id.clone(),
        });

        Ok(row_id)
    }

    /// Look up a fee row.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::RowNotFound`] when no such fee exists.
    pub fn get_fee(&self, row_id: &RowId) -> Result<&CartFee, CartError> {
        self.fees
            .iter()
            .find(|fee| fee.row_id() == row_id)
            .ok_or_else(|| CartError::RowNotFound(row_id.clone()))
    }

    /// Update a fee row; a resulting quantity of zero or below removes it.
    /// Returns the surviving row id, or `None` on removal.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::RowNotFound`] when no such fee exists.
    pub fn update_fee(
        &mut self,
        row_id: &RowId,
        update: FeeUpdate,
    ) -> Result<Option<RowId>, CartError> {
        let position = self
            .fees
            .iter()
            .position(|fee| fee.row_id() == row_id)
            .ok_or_else(|| CartError::RowNotFound(row_id.clone()))?;

        let mut fee = self.fees.remove(position);

        match update {
            FeeUpdate::Quantity(qty) => fee.apply_patch(FeePatch {
                item: ItemPatch {
                    qty: Some(qty),
                    ..ItemPatch::default()
                },
                ..FeePatch::default()
            }),
            FeeUpdate::Patch(patch) => fee.apply_patch(patch),
        }

        let new_row_id = fee.row_id().clone();

        if let Some(existing) = self
            .fees
            .iter_mut()
            .find(|existing| existing.row_id() == &new_row_id)
        {
            let combined = existing.qty() + fee.qty();
            *existing = fee;

            if combined > Decimal::ZERO {
                existing.set_quantity(combined)?;
            }
        } else {
            self.fees.push(fee);
        }

        let final_qty = self
            .get_fee(&new_row_id)
            .map(CartFee::qty)
            .unwrap_or(Decimal::ZERO);

        if final_qty <= Decimal::ZERO {
            self.remove_fee(&new_row_id)?;

            return Ok(None);
        }

        self.emit(CartEvent::FeeUpdated {
            row_id: new_row_id.clone(),
        });

        Ok(Some(new_row_id))
    }

    /// Remove a fee row.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::RowNotFound`] when no such fee exists.
    pub fn remove_fee(&mut self, row_id: &RowId) -> Result<(), CartError> {
        let position = self
            .fees
            .iter()
            .position(|fee| fee.row_id() == row_id)
            .ok_or_else(|| CartError::RowNotFound(row_id.clone()))?;

        self.fees.remove(position);

        self.emit(CartEvent::FeeRemoved {
            row_id: row_id.clone(),
        });

        Ok(())
    }

    /// Filter fee rows with a predicate.
    pub fn search_fees<'a, F>(&'a self, predicate: F) -> impl Iterator<Item = &'a CartFee>
    where
        F: Fn(&CartFee) -> bool + 'a,
    {
        self.fees.iter().filter(move |fee| predicate(fee))
    }

    // ------------------------------------------------------------------
    // Attributes.
    // ------------------------------------------------------------------

    /// The attribute map.
    pub fn attributes(&self) -> &BTreeMap<String, AttributeValue> {
        &self.attributes
    }

    /// Set an attribute. Writing the shipping attribute re-validates coupons,
    /// since shipping coupons depend on the address.
    pub fn add_attribute(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        let key = key.into();

        self.attributes.insert(key.clone(), value.into());

        if key == self.config.shipping_attribute {
            self.validate_coupons();
        }

        self.emit(CartEvent::AttributeAdded { key });
    }

    /// Look up an attribute.
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Remove an attribute if present.
    pub fn remove_attribute(&mut self, key: &str) {
        if self.attributes.remove(key).is_some() {
            self.emit(CartEvent::AttributeRemoved {
                key: key.to_owned(),
            });
        }
    }

    /// Country id from the shipping address attribute, if set.
    pub fn shipping_country_id(&self) -> Option<String> {
        let address = self
            .attribute(&self.config.shipping_attribute)?
            .get("address")?
            .get("country_id")?;

        match address {
            AttributeValue::Text(country) => Some(country.clone()),
            AttributeValue::Number(country) => Some(country.normalize().to_string()),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Coupons.
    // ------------------------------------------------------------------

    /// The cart-level coupon collection, keyed by code. Item-level coupons
    /// live on their rows and are not listed here.
    pub fn coupons(&self) -> &BTreeMap<String, Coupon> {
        &self.coupons
    }

    /// Every active coupon: the distinct item-level attachments merged with
    /// the cart-level collection, cart-level winning on code collisions.
    pub fn all_coupons(&self) -> BTreeMap<String, Coupon> {
        let mut coupons: BTreeMap<String, Coupon> = BTreeMap::new();

        for item in &self.items {
            if let Some(coupon) = item.coupon() {
                coupons
                    .entry(coupon.code().to_owned())
                    .or_insert_with(|| coupon.clone());
            }
        }

        for (code, coupon) in &self.coupons {
            coupons.insert(code.clone(), coupon.clone());
        }

        coupons
    }

    /// Look up a coupon anywhere in the cart.
    ///
    /// # Errors
    ///
    /// Returns [`CouponError::NotFound`] when no coupon carries the code.
    pub fn coupon(&self, code: &str) -> Result<Coupon, CouponError> {
        self.all_coupons()
            .remove(code)
            .ok_or_else(|| CouponError::NotFound(code.to_owned()))
    }

    /// Validate and apply a coupon.
    ///
    /// The coupon is recorded in the cart-level collection only when it
    /// declares itself cart-applied and its discount computes to a non-zero
    /// amount; item-level coupons live on the rows they discounted.
    ///
    /// # Errors
    ///
    /// Returns a [`CouponError`] when another coupon of the same type is
    /// active (unless configured otherwise), the cart total is already zero,
    /// or the coupon's own validation fails. The cart is unchanged on error.
    pub fn add_coupon(&mut self, coupon: Coupon) -> Result<(), CouponError> {
        if !self.config.allow_multiple_same_type_discount {
            let same_type_at_cart = self
                .coupons
                .values()
                .any(|existing| existing.coupon_type() == coupon.coupon_type());

            let same_type_on_items = self.items.iter().any(|item| {
                item.coupon()
                    .is_some_and(|existing| existing.coupon_type() == coupon.coupon_type())
            });

            if same_type_at_cart || same_type_on_items {
                return Err(CouponError::TypeConflict(self.config.coupon_label.clone()));
            }
        }

        if self.total_float(false) <= Decimal::ZERO {
            return Err(CouponError::NothingToDiscount);
        }

        coupon.apply(self)?;

        if coupon.is_apply_to_cart() {
            if let Ok(amount) = coupon.discount(self) {
                if !amount.is_zero() {
                    self.coupons.insert(coupon.code().to_owned(), coupon.clone());
                }
            }
        }

        self.emit(CartEvent::CouponAdded {
            code: coupon.code().to_owned(),
        });

        Ok(())
    }

    /// Reverse and detach a coupon by code.
    ///
    /// # Errors
    ///
    /// Returns [`CouponError::NotFound`] when no coupon carries the code.
    pub fn remove_coupon(&mut self, code: &str) -> Result<(), CouponError> {
        let coupon = self.coupon(code)?;

        coupon.forget(self);

        self.coupons.remove(code);

        self.emit(CartEvent::CouponRemoved {
            code: code.to_owned(),
        });

        Ok(())
    }

    // Re-check every cart-level coupon and detach the ones that stopped
    // being eligible. Failures are corrected, not surfaced.
    fn validate_coupons(&mut self) {
        let coupons: Vec<(String, Coupon)> = self
            .coupons
            .iter()
            .map(|(code, coupon)| (code.clone(), coupon.clone()))
            .collect();

        for (code, coupon) in coupons {
            if coupon.discount(self).is_err() {
                self.remove_coupon(&code).ok();
            }
        }
    }

    // ------------------------------------------------------------------
    // Member.
    // ------------------------------------------------------------------

    /// The active member, if any.
    pub fn member(&self) -> Option<&CartMember> {
        self.member.as_ref()
    }

    /// Apply a member discount to every eligible item. Replaces any member
    /// applied earlier.
    ///
    /// # Errors
    ///
    /// Returns a [`MemberError`] when the minimum spend is not met; the cart
    /// is unchanged in that case.
    pub fn apply_member(&mut self, member: CartMember) -> Result<(), MemberError> {
        let subtotal = self.subtotal_float();
        let config = self.config.clone();

        member.apply_to_items(&mut self.items, subtotal, &config)?;

        self.member = Some(member);

        Ok(())
    }

    /// Clear the member discount from every item.
    pub fn forget_member(&mut self) {
        if let Some(member) = self.member.take() {
            member.forget_items(&mut self.items);
        }
    }

    // ------------------------------------------------------------------
    // Vouchers.
    // ------------------------------------------------------------------

    /// Apply a voucher across eligible items, respecting its quantity cap.
    ///
    /// # Errors
    ///
    /// Returns a [`VoucherError`] when no item ultimately received the
    /// discount.
    pub fn apply_voucher(&mut self, voucher: &ItemVoucher) -> Result<(), VoucherError> {
        let config = self.config.clone();

        voucher.apply_to_items(&mut self.items, &config)
    }

    /// Remove a voucher from every row that carries it.
    pub fn remove_voucher(&mut self, code: &str) {
        for item in &mut self.items {
            item.remove_voucher(code);
        }
    }

    /// Total discount granted by the voucher with the given code.
    pub fn voucher_discount_total(&self, code: &str) -> Decimal {
        self.items.iter().fold(Decimal::ZERO, |acc, item| {
            acc + item.voucher_total_discount_amount(code, &self.config)
        })
    }

    // ------------------------------------------------------------------
    // Aggregate totals.
    // ------------------------------------------------------------------

    /// Sum of item subtotals, or totals when `with_tax` is set.
    pub fn items_total(&self, with_tax: bool) -> Decimal {
        self.items.iter().fold(Decimal::ZERO, |acc, item| {
            acc + if with_tax {
                item.total(&self.config)
            } else {
                item.subtotal(&self.config)
            }
        })
    }

    /// Sum of fee subtotals, or totals when `with_tax` is set.
    pub fn fees_total(&self, with_tax: bool) -> Decimal {
        self.fees.iter().fold(Decimal::ZERO, |acc, fee| {
            acc + if with_tax {
                fee.total(&self.config)
            } else {
                fee.subtotal(&self.config)
            }
        })
    }

    /// Sum over fees of one type.
    pub fn fees_type_total(&self, fee_type: &str, with_tax: bool) -> Decimal {
        self.fees
            .iter()
            .filter(|fee| fee.fee_type() == fee_type)
            .fold(Decimal::ZERO, |acc, fee| {
                acc + if with_tax {
                    fee.total(&self.config)
                } else {
                    fee.subtotal(&self.config)
                }
            })
    }

    /// Sum of item discount totals.
    pub fn discount_float(&self) -> Decimal {
        self.items.iter().fold(Decimal::ZERO, |acc, item| {
            acc + item.discount_total(&self.config)
        })
    }

    /// Sum of cart-level coupon discounts, optionally including the item
    /// discount totals. Item-level coupons are excluded here because their
    /// amounts already live in the rows.
    pub fn discounts_total(&self, with_item_discounts: bool) -> Decimal {
        let mut total = if with_item_discounts {
            self.discount_float()
        } else {
            Decimal::ZERO
        };

        for coupon in self.coupons.values() {
            total += coupon.discount(self).unwrap_or(Decimal::ZERO);
        }

        total
    }

    /// The base amount order coupons discount against.
    pub fn discountable_float(&self) -> Decimal {
        let mut subtotal = self.subtotal_float();

        if self.config.discount_on_fees {
            subtotal += self.fees_total(false);
        }

        subtotal
    }

    /// Sum of item subtotals.
    pub fn subtotal_float(&self) -> Decimal {
        self.items.iter().fold(Decimal::ZERO, |acc, item| {
            acc + item.subtotal(&self.config)
        })
    }

    /// Sum of item tax totals.
    pub fn tax_float(&self) -> Decimal {
        self.items.iter().fold(Decimal::ZERO, |acc, item| {
            acc + item.tax_total(&self.config)
        })
    }

    /// Undiscounted sum of `price * qty` over items.
    pub fn initial_float(&self) -> Decimal {
        self.items
            .iter()
            .fold(Decimal::ZERO, |acc, item| acc + item.qty() * item.price())
    }

    /// Total item weight.
    pub fn weight_float(&self) -> Decimal {
        self.items
            .iter()
            .fold(Decimal::ZERO, |acc, item| acc + item.qty() * item.weight())
    }

    /// Shipping cost carried on item options.
    pub fn item_shippings_float(&self) -> Decimal {
        self.items.iter().fold(Decimal::ZERO, |acc, item| {
            acc + item.qty() * item.options().shipping_cost()
        })
    }

    /// Item shipping costs plus shipping-typed fees.
    pub fn shipping_float(&self) -> Decimal {
        self.item_shippings_float() + self.fees_type_total(&self.config.shipping_fee_type, true)
    }

    /// The grand total: items and fees with tax, plus item shipping, minus
    /// cart-level discounts. Optionally floored at zero.
    pub fn total_float(&self, floor_negative: bool) -> Decimal {
        let total = self.items_total(true) + self.item_shippings_float() + self.fees_total(true)
            - self.discounts_total(false);

        if floor_negative {
            total.max(Decimal::ZERO)
        } else {
            total
        }
    }

    // ------------------------------------------------------------------
    // Persistence.
    // ------------------------------------------------------------------

    /// Snapshot the full cart contents.
    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            instance: self.instance.clone(),
            items: self.items.clone(),
            fees: self.fees.clone(),
            coupons: self.coupons.values().cloned().collect(),
            attributes: self.attributes.clone(),
            member: self.member.clone(),
        }
    }

    /// Persist the cart under a caller-supplied identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyStored`] when the identifier is taken.
    pub fn store(&self, store: &mut dyn CartStore, identifier: &str) -> Result<(), StoreError> {
        if store.exists(identifier) {
            return Err(StoreError::AlreadyStored(identifier.to_owned()));
        }

        store.insert(identifier, self.snapshot())?;

        self.emit(CartEvent::Stored {
            identifier: identifier.to_owned(),
        });

        Ok(())
    }

    /// Load a stored cart back, replacing the current contents and deleting
    /// the stored row. Returns whether the identifier existed.
    pub fn restore(&mut self, store: &mut dyn CartStore, identifier: &str) -> bool {
        let Some(snapshot) = store.delete(identifier) else {
            return false;
        };

        self.instance = snapshot.instance;
        self.items = snapshot.items;
        self.fees = snapshot.fees;
        self.coupons = snapshot
            .coupons
            .into_iter()
            .map(|coupon| (coupon.code().to_owned(), coupon))
            .collect();
        self.attributes = snapshot.attributes;
        self.member = snapshot.member;

        self.emit(CartEvent::Restored {
            identifier: identifier.to_owned(),
        });

        true
    }

    /// Merge a stored cart's items into this one, leaving the stored row in
    /// place. Returns whether the identifier existed.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] when an inherited discount rate is invalid.
    pub fn merge(
        &mut self,
        store: &dyn CartStore,
        identifier: &str,
        keep_discount: bool,
        keep_tax: bool,
    ) -> Result<bool, CartError> {
        let Some(snapshot) = store.select(identifier) else {
            return Ok(false);
        };

        for mut item in snapshot.items {
            if !keep_discount {
                item.set_discount(self.discount, false, false)?;
            }
            if !keep_tax {
                item.set_tax_rate(self.tax_rate);
            }

            self.add_cart_item(item);
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use testresult::TestResult;

    use crate::{
        coupons::{
            CouponCore, OrderCoupon, ProductItemCoupon,
            discountable::{Discountable, DiscountableIds},
        },
        fixtures,
    };

    use super::*;

    #[derive(Debug, Default, Clone)]
    struct RecordingSink(Rc<RefCell<Vec<CartEvent>>>);

    impl EventSink for RecordingSink {
        fn emit(&self, event: &CartEvent) {
            self.0.borrow_mut().push(event.clone());
        }
    }

    #[test]
    fn empty_cart_then_items_total() -> TestResult {
        let mut cart = fixtures::cart();

        assert!(cart.is_empty());
        assert_eq!(cart.items_total(false), Decimal::ZERO);

        fixtures::add_item(&mut cart, "1", "Product", 10, 3)?;

        assert_eq!(cart.items_total(false), Decimal::from(30));
        assert_eq!(cart.count(), Decimal::from(3));

        Ok(())
    }

    #[test]
    fn same_identity_merges_into_one_row() -> TestResult {
        let mut cart = fixtures::cart();

        let options = ItemOptions::new().with("size", "m").with("colour", "blue");
        let reversed = ItemOptions::new().with("colour", "blue").with("size", "m");

        cart.add("p1", "Shirt", Decimal::from(2), Decimal::TEN, Decimal::ZERO, options)?;
        cart.add("p1", "Shirt", Decimal::from(3), Decimal::TEN, Decimal::ZERO, reversed)?;

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.count(), Decimal::from(5));

        Ok(())
    }

    #[test]
    fn get_unknown_row_fails() {
        let cart = fixtures::cart();
        let bogus = RowId::generate("missing", &ItemOptions::new());

        assert!(matches!(cart.get(&bogus), Err(CartError::RowNotFound(_))));
    }

    #[test]
    fn update_to_zero_quantity_removes_the_row() -> TestResult {
        let mut cart = fixtures::cart();
        let row = fixtures::add_item(&mut cart, "p1", "One", 10, 2)?;

        let result = cart.update_item(&row, ItemUpdate::Quantity(Decimal::ZERO))?;

        assert_eq!(result, None);
        assert!(cart.is_empty());

        Ok(())
    }

    #[test]
    fn identity_change_merges_quantities() -> TestResult {
        let mut cart = fixtures::cart();

        let target = cart.add(
            "p1",
            "Shirt",
            Decimal::from(2),
            Decimal::TEN,
            Decimal::ZERO,
            ItemOptions::new().with("size", "m"),
        )?;
        let source = cart.add(
            "p1",
            "Shirt",
            Decimal::ONE,
            Decimal::TEN,
            Decimal::ZERO,
            ItemOptions::new().with("size", "l"),
        )?;

        let surviving = cart.update_item(
            &source,
            ItemUpdate::Patch(ItemPatch {
                options: Some(ItemOptions::new().with("size", "m")),
                ..ItemPatch::default()
            }),
        )?;

        assert_eq!(surviving.as_ref(), Some(&target));
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.get(&target)?.qty(), Decimal::from(3));

        Ok(())
    }

    #[test]
    fn fees_replace_instead_of_merging() -> TestResult {
        let mut cart = fixtures::cart();

        let fee = fixtures::shipping_fee(8)?;
        let row = cart.add_fee(fee, false, false)?;

        let replacement = fixtures::shipping_fee(12)?;
        cart.add_fee(replacement, false, false)?;

        assert_eq!(cart.fees().len(), 1);
        assert_eq!(cart.get_fee(&row)?.qty(), Decimal::ONE);
        assert_eq!(cart.fees_total(false), Decimal::from(12));

        Ok(())
    }

    #[test]
    fn fees_inherit_cart_defaults_unless_kept() -> TestResult {
        let mut cart = fixtures::cart();
        cart.set_global_tax(Decimal::from(6));

        let row = cart.add_fee(fixtures::shipping_fee(10)?, false, false)?;

        assert_eq!(cart.get_fee(&row)?.item().tax_rate(), Decimal::from(6));

        let mut kept = fixtures::shipping_fee(10)?;
        kept.apply_patch(FeePatch {
            item: ItemPatch {
                id: Some("express".into()),
                ..ItemPatch::default()
            },
            ..FeePatch::default()
        });
        kept.set_tax_rate(Decimal::ZERO);

        let kept_row = cart.add_fee(kept, true, true)?;

        assert_eq!(cart.get_fee(&kept_row)?.item().tax_rate(), Decimal::ZERO);

        Ok(())
    }

    #[test]
    fn grand_total_composes_items_fees_shipping_and_discounts() -> TestResult {
        let mut cart = fixtures::cart();

        fixtures::add_shipped_item(&mut cart, "p1", "One", 50, 2, 5)?;
        cart.add_fee(fixtures::shipping_fee(8)?, false, true)?;

        cart.add_coupon(Coupon::Order(OrderCoupon::new(
            CouponCore::new("TEN", Decimal::TEN).percentage(),
            None,
        )))?;

        // Items 100, shipping options 10, fee 8, order coupon 10% of 100.
        assert_eq!(cart.total_float(false), Decimal::from(108));

        Ok(())
    }

    #[test]
    fn order_coupon_detaches_when_min_spend_breaks() -> TestResult {
        let mut cart = fixtures::cart();

        let keep = fixtures::add_item(&mut cart, "p1", "One", 30, 1)?;
        let remove = fixtures::add_item(&mut cart, "p2", "Two", 30, 1)?;

        cart.add_coupon(Coupon::Order(OrderCoupon::new(
            CouponCore::new("BIG", Decimal::TEN).percentage(),
            Some(Decimal::from(50)),
        )))?;

        assert!(cart.coupons().contains_key("BIG"));

        cart.remove_item(&remove)?;

        // Min spend no longer met: silently detached, no error surfaced.
        assert!(cart.coupons().is_empty());
        assert!(cart.get(&keep).is_ok());

        Ok(())
    }

    #[test]
    fn item_coupon_detaches_with_its_row() -> TestResult {
        let mut cart = fixtures::cart();

        let row = fixtures::add_item(&mut cart, "p1", "One", 30, 1)?;

        let coupon = Coupon::ProductItem(ProductItemCoupon::new(
            CouponCore::new("ITEM", Decimal::TEN).percentage(),
            Discountable::new(DiscountableIds::of(["p1"]), "product one"),
            false,
            None,
        ));

        cart.add_coupon(coupon)?;

        // Item-level: discoverable by scanning rows, absent at cart level.
        assert!(cart.coupons().is_empty());
        assert!(cart.all_coupons().contains_key("ITEM"));

        cart.remove_item(&row)?;

        assert!(cart.all_coupons().is_empty());

        Ok(())
    }

    #[test]
    fn same_type_coupons_conflict() -> TestResult {
        let mut cart = fixtures::cart();
        fixtures::add_item(&mut cart, "p1", "One", 100, 1)?;

        cart.add_coupon(Coupon::Order(OrderCoupon::new(
            CouponCore::new("FIRST", Decimal::TEN).percentage(),
            None,
        )))?;

        let second = cart.add_coupon(Coupon::Order(OrderCoupon::new(
            CouponCore::new("SECOND", Decimal::from(5)),
            None,
        )));

        assert!(matches!(second, Err(CouponError::TypeConflict(_))));

        Ok(())
    }

    #[test]
    fn remove_coupon_restores_item_state() -> TestResult {
        let mut cart = fixtures::cart();
        let row = fixtures::add_item(&mut cart, "p1", "One", 100, 2)?;

        let before_subtotal = cart.subtotal_float();

        cart.add_coupon(Coupon::ProductItem(ProductItemCoupon::new(
            CouponCore::new("ITEM", Decimal::TEN).percentage(),
            Discountable::new(DiscountableIds::of(["p1"]), "product one"),
            false,
            None,
        )))?;

        assert_ne!(cart.subtotal_float(), before_subtotal);

        cart.remove_coupon("ITEM")?;

        let item = cart.get(&row)?;

        assert!(item.coupon().is_none());
        assert_eq!(item.discount_rate(), Decimal::ZERO);
        assert_eq!(cart.subtotal_float(), before_subtotal);

        Ok(())
    }

    #[test]
    fn events_fire_on_mutations() -> TestResult {
        let events = Rc::new(RefCell::new(Vec::new()));

        let mut cart = fixtures::cart();
        cart.set_event_sink(Box::new(RecordingSink(Rc::clone(&events))));

        let row = fixtures::add_item(&mut cart, "p1", "One", 10, 1)?;
        cart.add_attribute("note", "gift");
        cart.remove_item(&row)?;

        let recorded = events.borrow();

        assert!(matches!(recorded.first(), Some(CartEvent::ItemAdded { .. })));
        assert!(recorded
            .iter()
            .any(|event| matches!(event, CartEvent::AttributeAdded { .. })));
        assert!(recorded
            .iter()
            .any(|event| matches!(event, CartEvent::ItemRemoved { .. })));

        Ok(())
    }

    #[test]
    fn global_rates_propagate_to_rows() -> TestResult {
        let mut cart = fixtures::cart();
        let row = fixtures::add_item(&mut cart, "p1", "One", 100, 1)?;

        cart.set_global_tax(Decimal::from(21));
        cart.set_global_discount(Decimal::TEN, true, false)?;

        let item = cart.get(&row)?;

        assert_eq!(item.tax_rate(), Decimal::from(21));
        assert_eq!(item.discount_rate(), Decimal::TEN);

        Ok(())
    }
}
