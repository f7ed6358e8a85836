//! Options
//!
//! Typed option and attribute values. The original engine carried loose
//! per-instance bags with magic accessors; here both cart attributes and item
//! options are a closed value enum over a sorted map, which also gives row
//! identity hashing a canonical key order for free.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Option key for an item's per-unit shipping cost.
pub const SHIPPING_COST: &str = "shipping_cost";

/// Option key for a shipping discount granted by a shipping item coupon.
pub const SHIPPING_DISCOUNT: &str = "shipping_discount";

/// A single option or attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// Boolean flag.
    Bool(bool),

    /// Numeric value.
    Number(Decimal),

    /// Free-form text.
    Text(String),

    /// Nested map, e.g. a shipping address.
    Map(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
    /// The value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// The value as a number, if it is one.
    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// The value as text, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Look up a key in a nested map value.
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        match self {
            Self::Map(map) => map.get(key),
            _ => None,
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Decimal> for AttributeValue {
    fn from(value: Decimal) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Number(Decimal::from(value))
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.into())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<BTreeMap<String, AttributeValue>> for AttributeValue {
    fn from(value: BTreeMap<String, AttributeValue>) -> Self {
        Self::Map(value)
    }
}

/// Item options, keyed in lexicographic order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemOptions(BTreeMap<String, AttributeValue>);

impl ItemOptions {
    /// Create an empty option set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an option.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Insert an option, returning the updated set.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Look up an option by key.
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.0.get(key)
    }

    /// Remove an option, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<AttributeValue> {
        self.0.remove(key)
    }

    /// Whether the option set contains the given key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Iterate over options in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.0.iter()
    }

    /// Number of options.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the option set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Per-unit shipping cost, zero when absent or non-numeric.
    pub fn shipping_cost(&self) -> Decimal {
        self.get(SHIPPING_COST)
            .and_then(AttributeValue::as_number)
            .unwrap_or(Decimal::ZERO)
    }

    /// Shipping discount granted by a shipping item coupon, if any.
    pub fn shipping_discount(&self) -> Option<Decimal> {
        self.get(SHIPPING_DISCOUNT).and_then(AttributeValue::as_number)
    }

    /// A boolean option, `false` when absent or non-boolean.
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).and_then(AttributeValue::as_bool).unwrap_or(false)
    }
}

impl FromIterator<(String, AttributeValue)> for ItemOptions {
    fn from_iter<I: IntoIterator<Item = (String, AttributeValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
