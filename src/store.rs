//! Persistence
//!
//! The core does not own storage. A [`CartStore`] holds full-cart snapshots
//! keyed by a caller-supplied identifier, for save-for-later and merge-carts
//! flows. An in-memory implementation ships for tests and embedding.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::{
    coupons::Coupon, fee::CartFee, item::CartItem, member::CartMember, options::AttributeValue,
};

/// Errors raised by snapshot stores.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The identifier already holds a stored cart.
    #[error("a cart with identifier {0} was already stored")]
    AlreadyStored(String),
}

/// The full contents of a cart at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartSnapshot {
    /// Instance name the cart was using.
    pub instance: String,

    /// Item rows.
    pub items: Vec<CartItem>,

    /// Fee rows.
    pub fees: Vec<CartFee>,

    /// Cart-level coupons.
    pub coupons: Vec<Coupon>,

    /// Attribute map.
    pub attributes: BTreeMap<String, AttributeValue>,

    /// Active member, if any.
    pub member: Option<CartMember>,
}

/// Durable storage for cart snapshots.
pub trait CartStore: fmt::Debug {
    /// Whether the identifier holds a stored cart.
    fn exists(&self, identifier: &str) -> bool;

    /// Store a snapshot under an identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyStored`] when the identifier is taken.
    fn insert(&mut self, identifier: &str, snapshot: CartSnapshot) -> Result<(), StoreError>;

    /// Read a snapshot without removing it.
    fn select(&self, identifier: &str) -> Option<CartSnapshot>;

    /// Remove and return a snapshot.
    fn delete(&mut self, identifier: &str) -> Option<CartSnapshot>;
}

/// Process-local snapshot store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    rows: FxHashMap<String, CartSnapshot>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored carts.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl CartStore for InMemoryStore {
    fn exists(&self, identifier: &str) -> bool {
        self.rows.contains_key(identifier)
    }

    fn insert(&mut self, identifier: &str, snapshot: CartSnapshot) -> Result<(), StoreError> {
        if self.exists(identifier) {
            return Err(StoreError::AlreadyStored(identifier.to_owned()));
        }

        self.rows.insert(identifier.to_owned(), snapshot);

        Ok(())
    }

    fn select(&self, identifier: &str) -> Option<CartSnapshot> {
        self.rows.get(identifier).cloned()
    }

    fn delete(&mut self, identifier: &str) -> Option<CartSnapshot> {
        self.rows.remove(identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> CartSnapshot {
        CartSnapshot {
            instance: "default".into(),
            items: Vec::new(),
            fees: Vec::new(),
            coupons: Vec::new(),
            attributes: BTreeMap::new(),
            member: None,
        }
    }

    #[test]
    fn insert_select_delete_round_trip() {
        let mut store = InMemoryStore::new();

        assert!(!store.exists("order-1"));
        assert_eq!(store.insert("order-1", snapshot()), Ok(()));
        assert!(store.exists("order-1"));
        assert!(store.select("order-1").is_some());
        assert!(store.delete("order-1").is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut store = InMemoryStore::new();

        assert_eq!(store.insert("order-1", snapshot()), Ok(()));
        assert_eq!(
            store.insert("order-1", snapshot()),
            Err(StoreError::AlreadyStored("order-1".into()))
        );
    }
}
