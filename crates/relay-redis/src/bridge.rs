//! Cross-instance fan-out over Redis pub/sub.
//!
//! Each hub instance publishes the events its own clients emit and delivers
//! the events other instances publish. Envelopes carry the publishing
//! instance id so an instance never delivers its own events twice.
//! Publishing is best effort, like the rest of the relay.

use futures::stream::BoxStream;
use futures::StreamExt;
use redis::AsyncCommands;
use relay_core::OutboundEvent;
use relay_hub::Hub;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::{init_pool, RedisPool, RedisResult};

/// Message published on the shared channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeEnvelope {
    pub origin: String,
    pub event: OutboundEvent,
}

impl BridgeEnvelope {
    /// Decode a published message, skipping this instance's own envelopes.
    pub fn decode_remote(payload: &str, instance_id: &str) -> Option<OutboundEvent> {
        match serde_json::from_str::<BridgeEnvelope>(payload) {
            Ok(envelope) if envelope.origin == instance_id => None,
            Ok(envelope) => Some(envelope.event),
            Err(e) => {
                warn!(error = %e, "Dropping malformed bridge message");
                None
            }
        }
    }
}

/// Pub/sub operations the bridge needs from the broker.
pub trait BridgeTransport: Send {
    /// Open a fresh subscription. The stream ends when the subscription is lost.
    fn subscribe(&mut self) -> impl Future<Output = RedisResult<BoxStream<'static, String>>> + Send;

    fn publish(&mut self, payload: String) -> impl Future<Output = RedisResult<()>> + Send;
}

/// Redis-backed transport: a dedicated pub/sub connection per subscription
/// plus a reconnecting publisher.
pub struct RedisTransport {
    client: redis::Client,
    publisher: RedisPool,
    channel: String,
}

impl BridgeTransport for RedisTransport {
    async fn subscribe(&mut self) -> RedisResult<BoxStream<'static, String>> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&self.channel).await?;
        let messages = pubsub
            .into_on_message()
            .filter_map(|msg| async move {
                match msg.get_payload::<String>() {
                    Ok(payload) => Some(payload),
                    Err(e) => {
                        warn!(error = %e, "Unreadable bridge message");
                        None
                    }
                }
            })
            .boxed();
        Ok(messages)
    }

    async fn publish(&mut self, payload: String) -> RedisResult<()> {
        self.publisher.publish::<_, _, ()>(&self.channel, payload).await?;
        Ok(())
    }
}

/// Delay between resubscribe attempts, doubled after every failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
        }
    }
}

enum PumpExit {
    Shutdown,
    SubscriptionLost,
}

pub struct RedisBridge<T = RedisTransport> {
    transport: T,
    instance_id: String,
    retry: RetryPolicy,
}

impl RedisBridge<RedisTransport> {
    /// Connect to Redis. The subscription is opened by [`RedisBridge::run`].
    pub async fn connect(redis_url: &str, channel: &str) -> RedisResult<Self> {
        let (client, publisher) = init_pool(redis_url).await?;
        let bridge = Self::with_transport(RedisTransport {
            client,
            publisher,
            channel: channel.to_string(),
        });
        info!(channel = %channel, instance_id = %bridge.instance_id, "Redis bridge connected");
        Ok(bridge)
    }
}

impl<T: BridgeTransport> RedisBridge<T> {
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            instance_id: Uuid::new_v4().to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Pump events in both directions until `shutdown` fires.
    ///
    /// `egress` is the receiving end of the channel handed to
    /// [`Hub::with_egress`]. A lost or failed subscription is reopened with
    /// backoff; events published by other instances meanwhile are missed.
    pub async fn run(
        mut self,
        hub: Hub,
        mut egress: mpsc::UnboundedReceiver<OutboundEvent>,
        shutdown: CancellationToken,
    ) {
        let mut delay = self.retry.initial;

        loop {
            match self.transport.subscribe().await {
                Ok(messages) => {
                    info!(instance_id = %self.instance_id, "Redis bridge subscribed");
                    delay = self.retry.initial;
                    match self.pump(&hub, &mut egress, messages, &shutdown).await {
                        PumpExit::Shutdown => break,
                        PumpExit::SubscriptionLost => {
                            warn!(retry_in_ms = delay.as_millis() as u64, "Redis subscription lost");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, retry_in_ms = delay.as_millis() as u64, "Redis subscribe failed");
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
            delay = (delay * 2).min(self.retry.max);
        }

        info!("Redis bridge stopping");
    }

    async fn pump(
        &mut self,
        hub: &Hub,
        egress: &mut mpsc::UnboundedReceiver<OutboundEvent>,
        mut messages: BoxStream<'static, String>,
        shutdown: &CancellationToken,
    ) -> PumpExit {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return PumpExit::Shutdown,
                Some(event) = egress.recv() => {
                    self.publish(event).await;
                }
                payload = messages.next() => {
                    let Some(payload) = payload else {
                        return PumpExit::SubscriptionLost;
                    };
                    if let Some(event) = BridgeEnvelope::decode_remote(&payload, &self.instance_id) {
                        let delivered = hub.deliver(event);
                        debug!(delivered, "Delivered remote event");
                    }
                }
            }
        }
    }

    async fn publish(&mut self, event: OutboundEvent) {
        let envelope = BridgeEnvelope {
            origin: self.instance_id.clone(),
            event,
        };
        let payload = match serde_json::to_string(&envelope) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to encode bridge message");
                return;
            }
        };

        if let Err(e) = self.transport.publish(payload).await {
            warn!(error = %e, event = envelope.event.name(), "Failed to publish to Redis, event stays local");
        }
    }
}
