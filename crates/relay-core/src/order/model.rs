//! Order event domain models.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    string_field, timestamp_field, CREATED_AT, CUSTOMER_IDENTIFIER, ORDER_NO, RESTAURANT, STATUS,
    TRANSITION, UPDATED_AT,
};
use crate::error::{RelayError, RelayResult};

/// Order status as reported by the order service.
///
/// Only `Pending` and `Rejected` drive notifications; everything else is
/// carried through as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Accepted,
    Rejected,
    Other(String),
}

impl OrderStatus {
    /// Parse from string. Matching is exact, as emitted by the order service.
    pub fn from_str(s: &str) -> Self {
        match s {
            "Pending" => Self::Pending,
            "Accepted" => Self::Accepted,
            "Rejected" => Self::Rejected,
            other => Self::Other(other.to_string()),
        }
    }

    /// Convert to string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "Pending",
            Self::Accepted => "Accepted",
            Self::Rejected => "Rejected",
            Self::Other(s) => s,
        }
    }
}

/// Explicit lifecycle tag a producer may attach to a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Created,
    Accepted,
    Rejected,
}

impl Transition {
    /// Parse from string, case-insensitive. Unknown tags yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "created" => Some(Self::Created),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Typed view over an order payload.
///
/// Built leniently: identifiers are coerced to strings and unparseable
/// timestamps become `None`. Only a missing `orderNo` or `status` is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderEvent {
    pub order_no: String,
    pub customer_identifier: Option<String>,
    pub restaurant: Option<String>,
    pub status: OrderStatus,
    pub created_at_ms: Option<i64>,
    pub updated_at_ms: Option<i64>,
    pub transition: Option<Transition>,
}

impl OrderEvent {
    /// Build an order event from a raw payload.
    pub fn from_payload(payload: &Value) -> RelayResult<Self> {
        if !payload.is_object() {
            return Err(RelayError::malformed("payload is not an object"));
        }

        let order_no = string_field(payload, ORDER_NO)
            .ok_or_else(|| RelayError::malformed("missing orderNo"))?;
        let status = payload
            .get(STATUS)
            .and_then(Value::as_str)
            .map(OrderStatus::from_str)
            .ok_or_else(|| RelayError::malformed("missing status"))?;

        Ok(Self {
            order_no,
            customer_identifier: string_field(payload, CUSTOMER_IDENTIFIER),
            restaurant: string_field(payload, RESTAURANT),
            status,
            created_at_ms: timestamp_field(payload, CREATED_AT),
            updated_at_ms: timestamp_field(payload, UPDATED_AT),
            transition: payload
                .get(TRANSITION)
                .and_then(Value::as_str)
                .and_then(Transition::parse),
        })
    }

    /// True when the update timestamp has moved past creation.
    ///
    /// Unparseable timestamps never count as diverged.
    pub fn timestamps_diverged(&self) -> bool {
        match (self.created_at_ms, self.updated_at_ms) {
            (Some(created), Some(updated)) => updated > created,
            _ => false,
        }
    }
}
