//! Wire events exchanged with the hub.
//!
//! Every frame is an adjacently tagged JSON object:
//! `{"event": "order:created", "data": { ... }}`. Payloads are kept as raw
//! JSON so the hub forwards them field-for-field.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RelayError, RelayResult};

/// A new order was placed.
pub const ORDER_CREATED: &str = "order:created";
/// Restaurant staff changed an order's status.
pub const ORDER_STATUS_CHANGED: &str = "order:statusChanged";
/// Downstream channel carrying status changes.
pub const ORDER_UPDATED: &str = "order:updated";

/// Events accepted by the hub.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum InboundEvent {
    #[serde(rename = "order:created")]
    OrderCreated(Value),
    #[serde(rename = "order:statusChanged")]
    OrderStatusChanged(Value),
}

/// Events fanned out by the hub.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum OutboundEvent {
    #[serde(rename = "order:created")]
    OrderCreated(Value),
    #[serde(rename = "order:updated")]
    OrderUpdated(Value),
}

/// Untyped frame, used to report unknown event names precisely.
#[derive(Deserialize)]
struct Frame {
    event: String,
    #[serde(default)]
    data: Value,
}

impl InboundEvent {
    /// Build an inbound event from its wire name and payload.
    pub fn from_parts(name: &str, payload: Value) -> RelayResult<Self> {
        match name {
            ORDER_CREATED => Ok(Self::OrderCreated(payload)),
            ORDER_STATUS_CHANGED => Ok(Self::OrderStatusChanged(payload)),
            other => Err(RelayError::UnknownEvent(other.to_string())),
        }
    }

    /// Decode a JSON text frame.
    pub fn decode(text: &str) -> RelayResult<Self> {
        let frame: Frame = serde_json::from_str(text)?;
        Self::from_parts(&frame.event, frame.data)
    }

    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::OrderCreated(_) => ORDER_CREATED,
            Self::OrderStatusChanged(_) => ORDER_STATUS_CHANGED,
        }
    }

    /// Map to the event the hub rebroadcasts.
    ///
    /// `order:statusChanged` is renamed to `order:updated`; payloads are
    /// untouched.
    pub fn into_outbound(self) -> OutboundEvent {
        match self {
            Self::OrderCreated(payload) => OutboundEvent::OrderCreated(payload),
            Self::OrderStatusChanged(payload) => OutboundEvent::OrderUpdated(payload),
        }
    }
}

impl OutboundEvent {
    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::OrderCreated(_) => ORDER_CREATED,
            Self::OrderUpdated(_) => ORDER_UPDATED,
        }
    }

    /// The forwarded payload.
    pub fn payload(&self) -> &Value {
        match self {
            Self::OrderCreated(payload) | Self::OrderUpdated(payload) => payload,
        }
    }

    /// Encode as a JSON text frame.
    pub fn encode(&self) -> RelayResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a JSON text frame.
    pub fn decode(text: &str) -> RelayResult<Self> {
        let frame: Frame = serde_json::from_str(text)?;
        match frame.event.as_str() {
            ORDER_CREATED => Ok(Self::OrderCreated(frame.data)),
            ORDER_UPDATED => Ok(Self::OrderUpdated(frame.data)),
            other => Err(RelayError::UnknownEvent(other.to_string())),
        }
    }
}
