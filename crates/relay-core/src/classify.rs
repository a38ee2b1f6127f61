//! Order status transition classifier.
//!
//! Decides whether an `order:updated` payload warrants a customer
//! notification. Payloads carry no event-type discriminator, so unless the
//! producer tags the transition explicitly, "accepted" is inferred from the
//! update timestamp moving past creation while the status is still Pending.
//! Any later update that leaves the order Pending notifies again.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::order::model::{OrderEvent, OrderStatus, Transition};

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyKind {
    Success,
    Error,
}

/// Classifier outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Notify { kind: NotifyKind, message: String },
    Ignore,
}

impl Verdict {
    fn accepted(order_no: &str) -> Self {
        Self::Notify {
            kind: NotifyKind::Success,
            message: format!("Order {} has been accepted", order_no),
        }
    }

    fn rejected(order_no: &str) -> Self {
        Self::Notify {
            kind: NotifyKind::Error,
            message: format!("Order {} has been rejected", order_no),
        }
    }
}

/// Classify a parsed order event.
pub fn classify(order: &OrderEvent) -> Verdict {
    if let Some(transition) = order.transition {
        return match transition {
            Transition::Created => Verdict::Ignore,
            Transition::Accepted => Verdict::accepted(&order.order_no),
            Transition::Rejected => Verdict::rejected(&order.order_no),
        };
    }

    match order.status {
        OrderStatus::Pending if order.timestamps_diverged() => Verdict::accepted(&order.order_no),
        OrderStatus::Rejected => Verdict::rejected(&order.order_no),
        _ => Verdict::Ignore,
    }
}

/// Classify a raw payload, failing closed on malformed input.
pub fn classify_payload(payload: &Value) -> Verdict {
    match OrderEvent::from_payload(payload) {
        Ok(order) => classify(&order),
        Err(e) => {
            debug!(error = %e, "Ignoring malformed order payload");
            Verdict::Ignore
        }
    }
}
