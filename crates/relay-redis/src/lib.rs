//! Order Relay Redis Bridge
//!
//! Relays hub events through Redis pub/sub so that every hub instance
//! delivers every event to its own connections.

pub mod bridge;
pub mod client;

pub use bridge::{BridgeEnvelope, BridgeTransport, RedisBridge, RedisTransport, RetryPolicy};
pub use client::{init_pool, RedisError, RedisPool, RedisResult};
