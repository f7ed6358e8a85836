//! Coupons
//!
//! The promotion layer of the engine. Every coupon is one variant of the
//! [`Coupon`] enum; the variants differ in how eligibility is computed and in
//! where the discount is recorded — a cart-level accumulator consulted by the
//! totals, or the discount fields of individual item rows.
//!
//! Shared gate logic (validity windows, minimum spend) lives in free
//! functions here rather than inherited state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::{
    cart::Cart,
    config::CartConfig,
    item::{CartItem, ItemError},
    rounding::{display_amount, percent_of},
};

pub mod buy_x_get_y;
pub mod discountable;
pub mod min_required;
pub mod order;
pub mod product;
pub mod product_item;
pub mod shipping;
pub mod shipping_item;

pub use buy_x_get_y::BuyXGetYCoupon;
pub use min_required::MinRequiredItemCoupon;
pub use order::OrderCoupon;
pub use product::ProductCoupon;
pub use product_item::ProductItemCoupon;
pub use shipping::{MinRequiredShippingCoupon, ShippingCoupon};
pub use shipping_item::ShippingItemCoupon;

/// Errors raised while validating or applying a coupon.
#[derive(Debug, Error, PartialEq)]
pub enum CouponError {
    /// The validity window has closed.
    #[error("this discount code has expired")]
    Expired,

    /// The validity window has not opened yet.
    #[error("this discount code is not active until {0}")]
    NotYetActive(DateTime<Utc>),

    /// Another coupon of the same type is already active.
    #[error("multiple {0}s of the same type cannot be applied")]
    TypeConflict(String),

    /// The cart total is already zero or below.
    #[error("cannot further discount on the cart total")]
    NothingToDiscount,

    /// The discountable base is below the coupon's minimum.
    #[error("discount code is only applicable for order value equal or above {0}")]
    MinAmountNotMet(Decimal),

    /// The cart contents fail the coupon's structural requirements.
    #[error("the cart items do not meet the requirements of this discount")]
    RequirementsNotMet,

    /// Not enough eligible quantity to form a discounted portion.
    #[error("the cart does not contain enough item quantity to get this discount")]
    NotEnoughQuantity,

    /// No cart row falls inside the coupon's discountable scope.
    #[error("the cart does not contain items from {0}")]
    NoEligibleItems(String),

    /// The cart's shipping cost exceeds what the coupon covers.
    #[error("the cart shipping cost exceeds the discount code limit")]
    ShippingLimitExceeded,

    /// The shipping address carries no usable country.
    #[error("invalid shipping country")]
    InvalidShippingCountry,

    /// The shipping country is outside the allow-list.
    #[error("discount code can only be used on shipping addresses from {0}")]
    CountryNotAllowed(String),

    /// There is no shipping cost to discount.
    #[error("the cart does not contain any shipping cost")]
    NoAmountToDiscount,

    /// Unknown coupon code.
    #[error("the discount code {0} was not found")]
    NotFound(String),

    /// Invalid discount value while mutating an item.
    #[error(transparent)]
    Item(#[from] ItemError),
}

/// Where a coupon's discount points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CouponType {
    /// Discounts the order amount.
    OrderAmount,

    /// Discounts shipping cost.
    Shipping,
}

impl fmt::Display for CouponType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OrderAmount => f.write_str("order-amount"),
            Self::Shipping => f.write_str("shipping"),
        }
    }
}

/// Data shared by every coupon variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouponCore {
    /// Unique code within a cart.
    pub code: String,

    /// Discount value: percent when `percentage_discount` is set, amount otherwise.
    pub value: Decimal,

    /// Whether `value` is a percentage.
    pub percentage_discount: bool,

    /// Start of the validity window, if bounded.
    pub date_from: Option<DateTime<Utc>>,

    /// End of the validity window, if bounded.
    pub date_to: Option<DateTime<Utc>>,
}

impl CouponCore {
    /// Create a fixed-amount coupon core with an open validity window.
    pub fn new(code: impl Into<String>, value: Decimal) -> Self {
        Self {
            code: code.into(),
            value,
            percentage_discount: false,
            date_from: None,
            date_to: None,
        }
    }

    /// Mark the value as a percentage.
    #[must_use]
    pub fn percentage(mut self) -> Self {
        self.percentage_discount = true;
        self
    }

    /// Bound the validity window.
    #[must_use]
    pub fn valid_between(
        mut self,
        date_from: Option<DateTime<Utc>>,
        date_to: Option<DateTime<Utc>>,
    ) -> Self {
        self.date_from = date_from;
        self.date_to = date_to;
        self
    }

    /// User-facing rendering of the value, e.g. `10%` or a money string.
    pub fn display_value(&self, config: &CartConfig) -> String {
        if self.percentage_discount {
            format!("{}%", self.value.normalize())
        } else {
            display_amount(self.value, config.currency)
        }
    }

    pub(crate) fn validate_window(&self) -> Result<(), CouponError> {
        check_valid_window(self.date_from, self.date_to, Utc::now())
    }
}

/// Check a validity window against an explicit `now`.
///
/// # Errors
///
/// - [`CouponError::Expired`] when `now` is past `date_to`.
/// - [`CouponError::NotYetActive`] when `now` is before `date_from`.
pub fn check_valid_window(
    date_from: Option<DateTime<Utc>>,
    date_to: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), CouponError> {
    if let Some(until) = date_to {
        if now > until {
            return Err(CouponError::Expired);
        }
    }

    if let Some(from) = date_from {
        if now < from {
            return Err(CouponError::NotYetActive(from));
        }
    }

    Ok(())
}

/// Check the cart's discountable base against a minimum amount.
///
/// # Errors
///
/// Returns [`CouponError::MinAmountNotMet`] when the base (item subtotal,
/// plus fee subtotal when configured) is below `min_amount`.
pub fn check_min_amount(cart: &Cart, min_amount: Decimal) -> Result<(), CouponError> {
    let mut subtotal = cart.subtotal_float();

    if cart.config().discount_on_fees {
        subtotal += cart.fees_total(false);
    }

    if subtotal < min_amount {
        return Err(CouponError::MinAmountNotMet(min_amount));
    }

    Ok(())
}

// Per-unit discount value for one item: percentage coupons take their cut of
// the unit price (tax-inclusive when so configured), fixed coupons are worth
// their face value.
pub(crate) fn per_item_value(core: &CouponCore, item: &CartItem, config: &CartConfig) -> Decimal {
    if !core.percentage_discount {
        return core.value;
    }

    let base = if config.tax_item_before_discount {
        item.price_tax(config)
    } else {
        item.price()
    };

    percent_of(core.value, base)
}

/// A promotional instrument attached to a cart or to its items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Coupon {
    /// Flat or percentage discount on the order amount.
    Order(OrderCoupon),

    /// Cart-level discount derived from specific products.
    Product(ProductCoupon),

    /// Discount written onto eligible item rows.
    ProductItem(ProductItemCoupon),

    /// Item discount gated on a minimum spend or quantity.
    MinRequiredItem(MinRequiredItemCoupon),

    /// Buy X, get Y at a discount.
    BuyXGetY(BuyXGetYCoupon),

    /// Shipping discount recorded at cart level.
    Shipping(ShippingCoupon),

    /// Shipping discount gated on minimum order requirements.
    MinRequiredShipping(MinRequiredShippingCoupon),

    /// Shipping discount written onto eligible item rows.
    ShippingItem(ShippingItemCoupon),
}

impl Coupon {
    fn core(&self) -> &CouponCore {
        match self {
            Self::Order(coupon) => coupon.core(),
            Self::Product(coupon) => coupon.core(),
            Self::ProductItem(coupon) => coupon.core(),
            Self::MinRequiredItem(coupon) => coupon.core(),
            Self::BuyXGetY(coupon) => coupon.core(),
            Self::Shipping(coupon) => coupon.core(),
            Self::MinRequiredShipping(coupon) => coupon.core(),
            Self::ShippingItem(coupon) => coupon.core(),
        }
    }

    /// The coupon code.
    pub fn code(&self) -> &str {
        &self.core().code
    }

    /// The nominal discount value.
    pub fn value(&self) -> Decimal {
        self.core().value
    }

    /// Whether the value is a percentage.
    pub fn is_percentage_discount(&self) -> bool {
        self.core().percentage_discount
    }

    /// Which total this coupon discounts.
    pub fn coupon_type(&self) -> CouponType {
        match self {
            Self::Order(_) | Self::Product(_) | Self::ProductItem(_)
            | Self::MinRequiredItem(_) | Self::BuyXGetY(_) => CouponType::OrderAmount,
            Self::Shipping(_) | Self::MinRequiredShipping(_) | Self::ShippingItem(_) => {
                CouponType::Shipping
            }
        }
    }

    /// Whether this coupon is a shipping discount.
    pub fn is_shipping(&self) -> bool {
        self.coupon_type() == CouponType::Shipping
    }

    /// Whether the discount is recorded at cart level rather than written
    /// onto item rows.
    pub fn is_apply_to_cart(&self) -> bool {
        !matches!(
            self,
            Self::ProductItem(_) | Self::MinRequiredItem(_) | Self::BuyXGetY(_)
        )
    }

    /// Check eligibility without mutating anything.
    ///
    /// # Errors
    ///
    /// Returns the specific [`CouponError`] explaining why the coupon cannot
    /// apply.
    pub fn validate(&self, cart: &Cart) -> Result<(), CouponError> {
        match self {
            Self::Order(coupon) => coupon.validate(cart),
            Self::Product(coupon) => coupon.validate(),
            Self::ProductItem(coupon) => coupon.validate(),
            Self::MinRequiredItem(coupon) => coupon.validate(cart),
            Self::BuyXGetY(coupon) => coupon.validate(cart),
            Self::Shipping(coupon) => coupon.validate(),
            Self::MinRequiredShipping(coupon) => coupon.validate(cart),
            Self::ShippingItem(coupon) => coupon.validate(cart),
        }
    }

    /// Boolean wrapper over validation and discount computation.
    pub fn can_apply(&self, cart: &Cart) -> bool {
        self.discount(cart).is_ok()
    }

    /// Mutate the cart to grant this coupon's discount.
    ///
    /// # Errors
    ///
    /// Returns a [`CouponError`] when validation fails; the cart is left
    /// unchanged in that case.
    pub fn apply(&self, cart: &mut Cart) -> Result<(), CouponError> {
        match self {
            // Cart-level variants mutate nothing; applying them is a full
            // eligibility check so failures surface to the caller.
            Self::Order(_) | Self::Product(_) | Self::Shipping(_)
            | Self::MinRequiredShipping(_) => self.discount(cart).map(|_| ()),
            Self::ProductItem(coupon) => coupon.apply(cart),
            Self::MinRequiredItem(coupon) => coupon.apply(cart),
            Self::BuyXGetY(coupon) => coupon.apply(cart),
            Self::ShippingItem(coupon) => coupon.apply(cart),
        }
    }

    /// Reverse whatever [`apply`](Self::apply) granted.
    pub fn forget(&self, cart: &mut Cart) {
        match self {
            Self::Order(_) | Self::Product(_) | Self::Shipping(_)
            | Self::MinRequiredShipping(_) => {}
            Self::ProductItem(coupon) => coupon.forget(cart),
            Self::MinRequiredItem(coupon) => coupon.forget(cart),
            Self::BuyXGetY(coupon) => coupon.forget(cart),
            Self::ShippingItem(coupon) => coupon.forget(cart),
        }
    }

    /// Compute the discount amount this coupon currently grants.
    ///
    /// # Errors
    ///
    /// Returns a [`CouponError`] when the coupon is not (or no longer)
    /// eligible against the cart.
    pub fn discount(&self, cart: &Cart) -> Result<Decimal, CouponError> {
        match self {
            Self::Order(coupon) => coupon.discount(cart),
            Self::Product(coupon) => coupon.discount(cart),
            Self::ProductItem(coupon) => coupon.discount(cart),
            Self::MinRequiredItem(coupon) => coupon.discount(cart),
            Self::BuyXGetY(coupon) => coupon.discount(cart),
            Self::Shipping(coupon) => coupon.discount(cart),
            Self::MinRequiredShipping(coupon) => coupon.discount(cart),
            Self::ShippingItem(coupon) => coupon.discount(cart),
        }
    }

    /// Human-readable description of the coupon.
    pub fn describe(&self, config: &CartConfig) -> String {
        match self {
            Self::Order(coupon) => coupon.describe(config),
            Self::Product(coupon) => coupon.describe(config),
            Self::ProductItem(coupon) => coupon.describe(config),
            Self::MinRequiredItem(coupon) => coupon.describe(config),
            Self::BuyXGetY(coupon) => coupon.describe(config),
            Self::Shipping(coupon) => coupon.describe(),
            Self::MinRequiredShipping(coupon) => coupon.describe(),
            Self::ShippingItem(coupon) => coupon.describe(),
        }
    }
}
