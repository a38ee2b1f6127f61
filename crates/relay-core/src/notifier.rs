//! Hub notifier for the order service.
//!
//! The order service calls this after creating or updating an order so the
//! hub can fan the event out. Failures are logged and swallowed: a hub that
//! is down must never fail order placement.

use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::DEFAULT_HUB_URL;
use crate::event::InboundEvent;

/// Emits order lifecycle events to the hub over HTTP.
#[derive(Clone)]
pub struct HubNotifier {
    client: reqwest::Client,
    base_url: String,
}

impl HubNotifier {
    /// Create a new notifier with default settings.
    ///
    /// Uses the `ORDER_RELAY_API_URL` environment variable if set,
    /// otherwise defaults to `http://127.0.0.1:3030`.
    pub fn new() -> Self {
        let base_url = std::env::var("ORDER_RELAY_API_URL")
            .unwrap_or_else(|_| DEFAULT_HUB_URL.to_string());
        Self::with_url(&base_url)
    }

    /// Create a notifier with a custom base URL.
    pub fn with_url(base_url: &str) -> Self {
        debug!(base_url = %base_url, "HubNotifier initialized");
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(2))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Announce a newly created order.
    pub async fn notify_order_created(&self, order: Value) -> bool {
        self.emit(InboundEvent::OrderCreated(order)).await
    }

    /// Announce a status change on an existing order.
    pub async fn notify_status_changed(&self, order: Value) -> bool {
        self.emit(InboundEvent::OrderStatusChanged(order)).await
    }

    /// Post an event to `/internal/emit`. Returns whether the hub accepted it.
    pub async fn emit(&self, event: InboundEvent) -> bool {
        let url = format!("{}/internal/emit", self.base_url);
        let name = event.name();

        debug!(url = %url, event = name, "Sending order event to hub");

        match self.client.post(&url).json(&event).send().await {
            Ok(response) => {
                if response.status().is_success() {
                    debug!(event = name, "Order event accepted by hub");
                    true
                } else {
                    warn!(
                        event = name,
                        status_code = %response.status(),
                        "Order event rejected by hub"
                    );
                    false
                }
            }
            Err(e) => {
                debug!(
                    event = name,
                    error = %e,
                    url = %url,
                    "Failed to send order event (hub may not be running)"
                );
                false
            }
        }
    }
}

impl Default for HubNotifier {
    fn default() -> Self {
        Self::new()
    }
}
