//! Customer-side event filter.
//!
//! The hub delivers every order update to every subscriber; this is where
//! updates for other customers are discarded.

use relay_core::order::{string_field, CUSTOMER_IDENTIFIER};
use relay_core::{classify, NotifyKind, OrderEvent, OutboundEvent, Verdict};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::store::CustomerStore;

/// A notification to surface to the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotifyKind,
    pub message: String,
    pub order_no: String,
}

pub struct EventFilter<S> {
    store: S,
}

impl<S: CustomerStore> EventFilter<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Decide what, if anything, to show for a received event.
    pub fn evaluate(&self, event: &OutboundEvent) -> Option<Notification> {
        let OutboundEvent::OrderUpdated(payload) = event else {
            return None;
        };

        let Some(local) = self.store.customer_identifier() else {
            trace!("No local customer identifier, discarding update");
            return None;
        };
        if string_field(payload, CUSTOMER_IDENTIFIER).as_deref() != Some(local.as_str()) {
            trace!("Update addressed to another customer");
            return None;
        }

        let order = match OrderEvent::from_payload(payload) {
            Ok(order) => order,
            Err(e) => {
                debug!(error = %e, "Ignoring malformed order update");
                return None;
            }
        };

        match classify(&order) {
            Verdict::Notify { kind, message } => {
                debug!(order_no = %order.order_no, ?kind, "Order update for this customer");
                Some(Notification {
                    kind,
                    message,
                    order_no: order.order_no,
                })
            }
            Verdict::Ignore => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::{json, Value};

    const T: i64 = 1_714_564_800_000;

    fn update(customer: Value, status: &str, created_at: i64, updated_at: i64) -> OutboundEvent {
        OutboundEvent::OrderUpdated(json!({
            "orderNo": "B-12",
            "customerIdentifier": customer,
            "status": status,
            "createdAt": created_at,
            "updatedAt": updated_at
        }))
    }

    #[test]
    fn test_own_rejected_order_notifies() {
        let filter = EventFilter::new(MemoryStore::new("B"));
        let notification = filter.evaluate(&update(json!("B"), "Rejected", T, T)).unwrap();
        assert_eq!(notification.kind, NotifyKind::Error);
        assert_eq!(notification.order_no, "B-12");
        assert!(notification.message.contains("B-12"));
    }

    #[test]
    fn test_own_accepted_order_notifies() {
        let filter = EventFilter::new(MemoryStore::new("B"));
        let notification = filter
            .evaluate(&update(json!("B"), "Pending", T, T + 1000))
            .unwrap();
        assert_eq!(notification.kind, NotifyKind::Success);
    }

    #[test]
    fn test_other_customer_never_notifies() {
        let filter = EventFilter::new(MemoryStore::new("B"));
        for status in ["Pending", "Rejected", "Accepted", "Preparing"] {
            for (created, updated) in [(T, T), (T, T + 1000), (T + 1000, T)] {
                assert_eq!(
                    filter.evaluate(&update(json!("A"), status, created, updated)),
                    None
                );
            }
        }
    }

    #[test]
    fn test_numeric_identifier_matches_string() {
        let filter = EventFilter::new(MemoryStore::new("42"));
        assert!(filter.evaluate(&update(json!(42), "Rejected", T, T)).is_some());
    }

    #[test]
    fn test_missing_local_identifier_discards() {
        let filter = EventFilter::new(MemoryStore::default());
        assert_eq!(filter.evaluate(&update(json!("B"), "Rejected", T, T)), None);
    }

    #[test]
    fn test_created_channel_ignored() {
        let filter = EventFilter::new(MemoryStore::new("B"));
        let created = OutboundEvent::OrderCreated(json!({
            "orderNo": "B-12",
            "customerIdentifier": "B",
            "status": "Rejected"
        }));
        assert_eq!(filter.evaluate(&created), None);
    }

    #[test]
    fn test_malformed_update_ignored() {
        let filter = EventFilter::new(MemoryStore::new("B"));
        let event = OutboundEvent::OrderUpdated(json!({ "customerIdentifier": "B" }));
        assert_eq!(filter.evaluate(&event), None);
    }

    #[test]
    fn test_identifier_change_applies_immediately() {
        let store = std::sync::Arc::new(MemoryStore::new("A"));
        let filter = EventFilter::new(store.clone());
        let event = update(json!("B"), "Rejected", T, T);

        assert_eq!(filter.evaluate(&event), None);
        store.set("B");
        assert!(filter.evaluate(&event).is_some());
    }
}
