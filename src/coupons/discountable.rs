//! Discountables
//!
//! Resolved eligibility descriptors held by coupons from construction time.
//! The original looked these up lazily through stored class names; here the
//! caller resolves them up front and hands the data in.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The product ids a promotion may touch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DiscountableIds {
    /// Every item in the cart. The original spelt this `*`.
    All,

    /// A specific id set.
    Ids(BTreeSet<String>),
}

impl DiscountableIds {
    /// Match every item.
    pub fn all() -> Self {
        Self::All
    }

    /// Match a specific id set.
    pub fn of<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Ids(ids.into_iter().map(Into::into).collect())
    }

    /// Whether the given product id is in scope.
    pub fn matches(&self, id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Ids(ids) => ids.contains(id),
        }
    }
}

/// Product scope plus a human-readable description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discountable {
    ids: DiscountableIds,
    description: String,
}

impl Discountable {
    /// Create a discountable scope.
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

/// Whether a minimum-spend gate counts money or units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequiredSpend {
    /// Gate on the eligible items' total amount.
    Amount,

    /// Gate on the eligible items' total quantity.
    Quantity,
}

/// Scope with a minimum-spend or minimum-quantity gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinRequiredDiscountable {
    discountable: Discountable,
    spend_type: RequiredSpend,
    min_amount: Option<Decimal>,
    min_quantity: Option<Decimal>,
}

impl MinRequiredDiscountable {
    /// Gate on a minimum eligible amount.
    pub fn amount(discountable: Discountable, min_amount: Decimal) -> Self {
        Self {
            discountable,
            spend_type: RequiredSpend::Amount,
            min_amount: Some(min_amount),
            min_quantity: None,
        }
    }

    /// Gate on a minimum eligible quantity.
    pub fn quantity(discountable: Discountable, min_quantity: Decimal) -> Self {
        Self {
            discountable,
            spend_type: RequiredSpend::Quantity,
            min_amount: None,
            min_quantity: Some(min_quantity),
        }
    }

    /// The underlying scope.
    pub fn discountable(&self) -> &Discountable {
        &self.discountable
    }

    /// Which dimension the gate measures.
    pub fn spend_type(&self) -> RequiredSpend {
        self.spend_type
    }

    /// Minimum amount, when gating on amount.
    pub fn min_amount(&self) -> Option<Decimal> {
        self.min_amount
    }

    /// Minimum quantity, when gating on quantity.
    pub fn min_quantity(&self) -> Option<Decimal> {
        self.min_quantity
    }
}

/// Scope for buy-X-get-Y promotions.
///
/// The required group must be bought at full price; the discountable group
/// receives the discount. The two may overlap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyXGetYDiscountable {
    discountable: Discountable,
    required_ids: DiscountableIds,
    min_required_quantity: Decimal,
    min_required_amount: Option<Decimal>,
    receive_quantity: Decimal,
}

impl BuyXGetYDiscountable {
    /// Create a buy-X-get-Y scope.
    ///
    /// When `min_required_amount` is set the promotion gates on spend instead
    /// of pack counting, and the discounted portion is fixed at
    /// `receive_quantity`.
    pub fn new(
        discountable: Discountable,
        required_ids: DiscountableIds,
        min_required_quantity: Decimal,
        min_required_amount: Option<Decimal>,
        receive_quantity: Decimal,
    ) -> Self {
        Self {
            discountable,
            required_ids,
            min_required_quantity,
            min_required_amount,
            receive_quantity,
        }
    }

    /// The group receiving the discount.
    pub fn discountable(&self) -> &Discountable {
        &self.discountable
    }

    /// The group that must be present at full price.
    pub fn required_ids(&self) -> &DiscountableIds {
        &self.required_ids
    }

    /// Units to buy per pack (the X).
    pub fn min_required_quantity(&self) -> Decimal {
        self.min_required_quantity
    }

    /// Spend threshold replacing the quantity requirement, when set.
    pub fn min_required_amount(&self) -> Option<Decimal> {
        self.min_required_amount
    }

    /// Units received per pack (the Y).
    pub fn receive_quantity(&self) -> Decimal {
        self.receive_quantity
    }
}

/// Scope for shipping coupons: a country allow-list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingDiscountable {
    allowed_countries: BTreeSet<String>,
    description: String,
}

impl ShippingDiscountable {
    /// Create a shipping scope. An empty country set allows every country.
    pub fn new<I, S>(allowed_countries: I, description: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_countries: allowed_countries.into_iter().map(Into::into).collect(),
            description: description.into(),
        }
    }

    /// The allowed shipping countries.
    pub fn allowed_countries(&self) -> &BTreeSet<String> {
        &self.allowed_countries
    }

    /// Human-readable description of the allowed destinations.
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Shipping scope with minimum order gates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinRequiredShippingDiscountable {
    shipping: ShippingDiscountable,
    min_amount: Option<Decimal>,
    min_quantity: Option<Decimal>,
}

impl MinRequiredShippingDiscountable {
    /// Create a gated shipping scope.
    pub fn new(
        shipping: ShippingDiscountable,
        min_amount: Option<Decimal>,
        min_quantity: Option<Decimal>,
    ) -> Self {
        Self {
            shipping,
            min_amount,
            min_quantity,
        }
    }

    /// The underlying shipping scope.
    pub fn shipping(&self) -> &ShippingDiscountable {
        &self.shipping
    }

    /// Minimum order amount, if gated.
    pub fn min_amount(&self) -> Option<Decimal> {
        self.min_amount
    }

    /// Minimum order quantity, if gated.
    pub fn min_quantity(&self) -> Option<Decimal> {
        self.min_quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_matches_everything() {
        let ids = DiscountableIds::all();

        assert!(ids.matches("p1"));
        assert!(ids.matches("anything"));
    }

    #[test]
    fn id_set_matches_members_only() {
        let ids = DiscountableIds::of(["p1", "p2"]);

        assert!(ids.matches("p1"));
        assert!(!ids.matches("p3"));
    }

    #[test]
    fn min_required_constructors_set_spend_type() {
        let scope = Discountable::new(DiscountableIds::all(), "everything");

        let by_amount = MinRequiredDiscountable::amount(scope.clone(), Decimal::from(50));
        let by_quantity = MinRequiredDiscountable::quantity(scope, Decimal::from(3));

        assert_eq!(by_amount.spend_type(), RequiredSpend::Amount);
        assert_eq!(by_amount.min_amount(), Some(Decimal::from(50)));
        assert_eq!(by_quantity.spend_type(), RequiredSpend::Quantity);
        assert_eq!(by_quantity.min_quantity(), Some(Decimal::from(3)));
    }
}
