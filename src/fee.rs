//! Fees
//!
//! A fee is a named, typed charge (shipping, handling, gift wrap) layered
//! into the cart totals alongside items. It embeds the full item arithmetic
//! and is always created with quantity 1.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    config::CartConfig,
    item::{CartItem, ItemError, ItemPatch, RowId},
    options::ItemOptions,
};

/// Partial update applied to an existing fee row.
#[derive(Debug, Clone, Default)]
pub struct FeePatch {
    /// Underlying item changes.
    pub item: ItemPatch,

    /// New fee type tag.
    pub fee_type: Option<String>,

    /// New description.
    pub description: Option<String>,
}

/// A typed charge in the cart's fee collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartFee {
    #[serde(flatten)]
    item: CartItem,
    fee_type: String,
    description: String,
}

impl CartFee {
    /// Create a fee with quantity 1.
    ///
    /// # Errors
    ///
    /// Returns an [`ItemError`] when the type tag is empty or the underlying
    /// item fields are invalid.
    pub fn new(
        id: impl Into<String>,
        fee_type: impl Into<String>,
        name: impl Into<String>,
        price: Decimal,
        description: impl Into<String>,
        weight: Decimal,
        options: ItemOptions,
    ) -> Result<Self, ItemError> {
        let fee_type = fee_type.into();

        if fee_type.is_empty() {
            return Err(ItemError::InvalidType);
        }

        let item = CartItem::new(id, name, price, weight, options)?;

        Ok(Self {
            item,
            fee_type,
            description: description.into(),
        })
    }

    /// The fee's type tag.
    pub fn fee_type(&self) -> &str {
        &self.fee_type
    }

    /// The fee's description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The underlying item state.
    pub fn item(&self) -> &CartItem {
        &self.item
    }

    /// The underlying item state, mutably.
    pub fn item_mut(&mut self) -> &mut CartItem {
        &mut self.item
    }

    /// The stable row identity.
    pub fn row_id(&self) -> &RowId {
        self.item.row_id()
    }

    /// The quantity on this fee row.
    pub fn qty(&self) -> Decimal {
        self.item.qty()
    }

    /// Set the quantity.
    ///
    /// # Errors
    ///
    /// Returns [`ItemError::InvalidQuantity`] for zero or negative values.
    pub fn set_quantity(&mut self, qty: Decimal) -> Result<(), ItemError> {
        self.item.set_quantity(qty)
    }

    /// Apply a discount to this fee.
    ///
    /// # Errors
    ///
    /// Returns [`ItemError::InvalidDiscountValue`] for percentage values
    /// outside `0..=100`.
    pub fn set_discount(
        &mut self,
        amount: Decimal,
        percentage: bool,
        apply_once: bool,
    ) -> Result<(), ItemError> {
        self.item.set_discount(amount, percentage, apply_once)
    }

    /// Set the tax percent.
    pub fn set_tax_rate(&mut self, tax_rate: Decimal) {
        self.item.set_tax_rate(tax_rate);
    }

    /// Fee subtotal (without tax).
    pub fn subtotal(&self, config: &CartConfig) -> Decimal {
        self.item.subtotal(config)
    }

    /// Fee total (with tax).
    pub fn total(&self, config: &CartConfig) -> Decimal {
        self.item.total(config)
    }

    /// Apply a partial update and refresh the row identity.
    pub fn apply_patch(&mut self, patch: FeePatch) {
        if let Some(fee_type) = patch.fee_type {
            self.fee_type = fee_type;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }

        self.item.apply_patch(patch.item);
    }
}
