//! Order Relay Core Library
//!
//! Order event model, wire envelopes and the status transition classifier
//! shared by the broadcast hub and its subscribers.

pub mod classify;
pub mod config;
pub mod error;
pub mod event;
pub mod notifier;
pub mod order;

pub use classify::{classify, classify_payload, NotifyKind, Verdict};
pub use error::{RelayError, RelayResult};
pub use event::{InboundEvent, OutboundEvent};
pub use order::model::{OrderEvent, OrderStatus, Transition};
