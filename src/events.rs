//! Events
//!
//! Fire-and-forget notifications emitted after every structural cart
//! mutation. The cart never reads these back; they exist for logging and
//! analytics sinks supplied by the embedding application.

use std::fmt;

use serde::Serialize;

use crate::item::RowId;

/// A domain event describing a completed cart mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum CartEvent {
    /// An item row was inserted or merged into.
    ItemAdded {
        /// Row that was added or merged into.
        row_id: RowId,
    },

    /// An item row was changed in place.
    ItemUpdated {
        /// Row that was updated.
        row_id: RowId,
    },

    /// An item row was removed.
    ItemRemoved {
        /// Row that was removed.
        row_id: RowId,
    },

    /// A fee row was inserted or replaced.
    FeeAdded {
        /// Fee row that was added.
        row_id: RowId,
    },

    /// A fee row was changed in place.
    FeeUpdated {
        /// Fee row that was updated.
        row_id: RowId,
    },

    /// A fee row was removed.
    FeeRemoved {
        /// Fee row that was removed.
        row_id: RowId,
    },

    /// A coupon was applied.
    CouponAdded {
        /// Code of the coupon.
        code: String,
    },

    /// A coupon was reversed and detached.
    CouponRemoved {
        /// Code of the coupon.
        code: String,
    },

    /// A cart attribute was set.
    AttributeAdded {
        /// Attribute key.
        key: String,
    },

    /// A cart attribute was removed.
    AttributeRemoved {
        /// Attribute key.
        key: String,
    },

    /// The cart was persisted under an identifier.
    Stored {
        /// Caller-supplied identifier.
        identifier: String,
    },

    /// A stored cart was loaded back.
    Restored {
        /// Caller-supplied identifier.
        identifier: String,
    },
}

/// Receiver for cart events.
pub trait EventSink: fmt::Debug {
    /// Handle one event. Must not fail; the cart ignores the outcome.
    fn emit(&self, event: &CartEvent);
}

/// Default sink: logs every event through `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &CartEvent) {
        tracing::debug!(?event, "cart event");
    }
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &CartEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sinks_accept_events() {
        let event = CartEvent::CouponAdded {
            code: "SAVE10".into(),
        };

        TracingSink.emit(&event);
        NullSink.emit(&event);
    }

    #[test]
    fn events_compare_by_payload() {
        let a = CartEvent::AttributeAdded { key: "shipping".into() };
        let b = CartEvent::AttributeAdded { key: "shipping".into() };
        let c = CartEvent::AttributeRemoved { key: "shipping".into() };

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
