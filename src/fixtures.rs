//! Fixtures
//!
//! Canned carts, items, and promotion scopes used by the test suites.

use rust_decimal::Decimal;

use crate::{
    cart::{Cart, CartError},
    config::CartConfig,
    coupons::discountable::{Discountable, DiscountableIds},
    fee::CartFee,
    item::{CartItem, ItemError, RowId},
    options::{ItemOptions, SHIPPING_COST},
};

/// A cart with default configuration.
pub fn cart() -> Cart {
    Cart::new(CartConfig::default())
}

/// Add a plain item with an integral price and quantity.
///
/// # Errors
///
/// Returns a [`CartError`] for invalid input.
pub fn add_item(
    cart: &mut Cart,
    id: &str,
    name: &str,
    price: i64,
    qty: i64,
) -> Result<RowId, CartError> {
    cart.add(
        id,
        name,
        Decimal::from(qty),
        Decimal::from(price),
        Decimal::ZERO,
        ItemOptions::new(),
    )
}

/// Add an item carrying a per-unit shipping cost option.
///
/// # Errors
///
/// Returns a [`CartError`] for invalid input.
pub fn add_shipped_item(
    cart: &mut Cart,
    id: &str,
    name: &str,
    price: i64,
    qty: i64,
    shipping_cost: i64,
) -> Result<RowId, CartError> {
    cart.add(
        id,
        name,
        Decimal::from(qty),
        Decimal::from(price),
        Decimal::ZERO,
        ItemOptions::new().with(SHIPPING_COST, Decimal::from(shipping_cost)),
    )
}

/// A standard shipping fee row.
///
/// # Errors
///
/// Returns an [`ItemError`] for invalid input.
pub fn shipping_fee(price: i64) -> Result<CartFee, ItemError> {
    CartFee::new(
        "shipping",
        "shipping",
        "Standard shipping",
        Decimal::from(price),
        "3-5 working days",
        Decimal::ZERO,
        ItemOptions::new(),
    )
}

/// A discountable scope over the given product ids.
pub fn product_scope(ids: &[&str], description: &str) -> Discountable {
    Discountable::new(DiscountableIds::of(ids.iter().copied()), description)
}

/// A member-discountable item: flagged via the default configuration key.
///
/// # Errors
///
/// Returns an [`ItemError`] for invalid input.
pub fn member_discountable_item(
    id: &str,
    name: &str,
    price: i64,
    qty: i64,
) -> Result<CartItem, ItemError> {
    let options = ItemOptions::new().with("member_discountable", true);

    let mut item = CartItem::new(id, name, Decimal::from(price), Decimal::ZERO, options)?;
    item.set_quantity(Decimal::from(qty))?;

    Ok(item)
}
