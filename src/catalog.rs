//! Catalog
//!
//! The cart does not own a product catalog. Anything that can be added from a
//! catalog reference implements [`Purchasable`], consulted once at item
//! creation time.

use rust_decimal::Decimal;

use crate::options::ItemOptions;

/// A catalog entry the cart can turn into a line item.
///
/// The option map is passed through so variant-dependent attributes (price,
/// name, identity) can be resolved per selection.
pub trait Purchasable {
    /// Stable product identifier for the given option selection.
    fn identifier(&self, options: &ItemOptions) -> String;

    /// Display name for the given option selection.
    fn name(&self, options: &ItemOptions) -> String;

    /// Longer description, if the catalog carries one.
    fn description(&self, options: &ItemOptions) -> Option<String> {
        let _ = options;
        None
    }

    /// Unit price, tax treatment per the cart configuration.
    fn price(&self, options: &ItemOptions) -> Decimal;

    /// Unit weight.
    fn weight(&self, options: &ItemOptions) -> Decimal {
        let _ = options;
        Decimal::ZERO
    }

    /// Image URL, if the catalog carries one.
    fn image_url(&self, options: &ItemOptions) -> Option<String> {
        let _ = options;
        None
    }

    /// Whether stock covers the requested quantity.
    fn has_stock(&self, qty: Decimal) -> bool {
        let _ = qty;
        true
    }
}
