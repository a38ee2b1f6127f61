//! Broadcast hub: connection registry and fan-out.
//!
//! Every registered connection holds its own receiver on a shared broadcast
//! channel, so a slow or dead client only loses its own events. Delivery is
//! at-most-once with no replay: a connection registered after an event was
//! sent never sees it.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use relay_core::order::{string_field, CUSTOMER_IDENTIFIER, RESTAURANT};
use relay_core::{InboundEvent, OutboundEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default fan-out buffer.
pub const DEFAULT_CAPACITY: usize = 256;

/// Optional delivery filter a connection registers with.
///
/// An unscoped connection receives every event. Each field that is set must
/// match the event payload (compared as strings).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub customer_identifier: Option<String>,
    pub restaurant: Option<String>,
}

impl Scope {
    /// Scope limited to one customer.
    pub fn customer(id: impl Into<String>) -> Self {
        Self {
            customer_identifier: Some(id.into()),
            restaurant: None,
        }
    }

    /// Scope limited to one restaurant.
    pub fn restaurant(id: impl Into<String>) -> Self {
        Self {
            customer_identifier: None,
            restaurant: Some(id.into()),
        }
    }

    /// Drop blank fields, as produced by empty query parameters.
    pub fn normalized(self) -> Self {
        let keep = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            customer_identifier: keep(self.customer_identifier),
            restaurant: keep(self.restaurant),
        }
    }

    pub fn is_unscoped(&self) -> bool {
        self.customer_identifier.is_none() && self.restaurant.is_none()
    }

    /// Whether an event should be delivered under this scope.
    pub fn admits(&self, event: &OutboundEvent) -> bool {
        let payload = event.payload();
        let field_matches = |wanted: &Option<String>, key: &str| match wanted {
            None => true,
            Some(wanted) => string_field(payload, key).as_deref() == Some(wanted.as_str()),
        };
        field_matches(&self.customer_identifier, CUSTOMER_IDENTIFIER)
            && field_matches(&self.restaurant, RESTAURANT)
    }
}

/// Registry entry for an active connection.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub id: String,
    pub scope: Scope,
    pub connected_at: DateTime<Utc>,
}

/// The broadcast hub. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Hub {
    tx: broadcast::Sender<OutboundEvent>,
    connections: Arc<DashMap<String, ConnectionInfo>>,
    egress: Option<mpsc::UnboundedSender<OutboundEvent>>,
}

impl Hub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            connections: Arc::new(DashMap::new()),
            egress: None,
        }
    }

    /// Also forward locally originated events to `egress`, for cross-instance
    /// fan-out.
    pub fn with_egress(mut self, egress: mpsc::UnboundedSender<OutboundEvent>) -> Self {
        self.egress = Some(egress);
        self
    }

    /// Register a connection and start receiving events from now on.
    pub fn register_connection(&self, scope: Scope) -> ConnectionHandle {
        let id = Uuid::new_v4().to_string();
        let rx = self.tx.subscribe();

        self.connections.insert(
            id.clone(),
            ConnectionInfo {
                id: id.clone(),
                scope: scope.clone(),
                connected_at: Utc::now(),
            },
        );

        info!(
            connection_id = %id,
            scoped = !scope.is_unscoped(),
            connections = self.connections.len(),
            "Client connected"
        );

        ConnectionHandle {
            id,
            scope,
            rx,
            registry: Arc::clone(&self.connections),
        }
    }

    /// Remove a connection from the active set. Returns whether it was present.
    ///
    /// Dropping the [`ConnectionHandle`] does the same, so calling this is
    /// only needed to unregister before the handle goes away.
    pub fn unregister_connection(&self, id: &str) -> bool {
        unregister(&self.connections, id)
    }

    /// Rebroadcast an inbound event to every connection, the sender included.
    ///
    /// Returns the number of local connections whose scope admits the event.
    pub fn handle_inbound_event(&self, event: InboundEvent) -> usize {
        let inbound_name = event.name();
        let outbound = event.into_outbound();

        if let Some(egress) = &self.egress {
            if egress.send(outbound.clone()).is_err() {
                warn!(event = inbound_name, "Egress bridge is gone, event stays local");
            }
        }

        let delivered = self.deliver(outbound);
        debug!(event = inbound_name, delivered, "Event fanned out");
        delivered
    }

    /// Fan an already mapped event out to local connections only.
    ///
    /// Returns the number of registered connections whose scope admits the
    /// event. A lagging connection may still miss it.
    pub fn deliver(&self, event: OutboundEvent) -> usize {
        let admitted = self
            .connections
            .iter()
            .filter(|entry| entry.value().scope.admits(&event))
            .count();
        // An error only means nobody is listening.
        match self.tx.send(event) {
            Ok(_) => admitted,
            Err(_) => 0,
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Snapshot of the registry.
    pub fn connections(&self) -> Vec<ConnectionInfo> {
        self.connections.iter().map(|e| e.value().clone()).collect()
    }
}

fn unregister(connections: &DashMap<String, ConnectionInfo>, id: &str) -> bool {
    let removed = connections.remove(id).is_some();
    if removed {
        info!(
            connection_id = %id,
            connections = connections.len(),
            "Client disconnected"
        );
    }
    removed
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Receiving side of a registered connection.
///
/// The connection stays in the registry for as long as the handle lives.
pub struct ConnectionHandle {
    id: String,
    scope: Scope,
    rx: broadcast::Receiver<OutboundEvent>,
    registry: Arc<DashMap<String, ConnectionInfo>>,
}

impl ConnectionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Wait for the next event admitted by this connection's scope.
    ///
    /// Returns `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<OutboundEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.scope.admits(&event) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(connection_id = %self.id, skipped, "Connection lagged, events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next pending event without waiting.
    pub fn try_recv(&mut self) -> Option<OutboundEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.scope.admits(&event) => return Some(event),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(connection_id = %self.id, skipped, "Connection lagged, events dropped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        unregister(&self.registry, &self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn order(customer: &str, status: &str) -> Value {
        json!({
            "orderNo": "1001",
            "customerIdentifier": customer,
            "restaurant": "r-1",
            "status": status,
            "createdAt": "2024-05-01T12:00:00.000Z",
            "updatedAt": "2024-05-01T12:00:00.000Z"
        })
    }

    fn drain(handle: &mut ConnectionHandle) -> Vec<OutboundEvent> {
        std::iter::from_fn(|| handle.try_recv()).collect()
    }

    #[test]
    fn test_created_reaches_every_connection_including_sender() {
        let hub = Hub::default();
        let mut sender = hub.register_connection(Scope::default());
        let mut other = hub.register_connection(Scope::default());
        let payload = order("c-1", "Pending");

        let delivered = hub.handle_inbound_event(InboundEvent::OrderCreated(payload.clone()));

        assert_eq!(delivered, 2);
        for handle in [&mut sender, &mut other] {
            assert_eq!(
                drain(handle),
                vec![OutboundEvent::OrderCreated(payload.clone())]
            );
        }
    }

    #[test]
    fn test_status_changed_arrives_as_updated() {
        let hub = Hub::default();
        let mut conn = hub.register_connection(Scope::default());
        let payload = order("c-1", "Rejected");

        hub.handle_inbound_event(InboundEvent::OrderStatusChanged(payload.clone()));

        let events = drain(&mut conn);
        assert_eq!(events, vec![OutboundEvent::OrderUpdated(payload)]);
        assert_eq!(events[0].name(), "order:updated");
    }

    #[test]
    fn test_late_joiner_sees_nothing() {
        let hub = Hub::default();
        let mut early = hub.register_connection(Scope::default());
        hub.handle_inbound_event(InboundEvent::OrderCreated(order("c-1", "Pending")));

        let mut late = hub.register_connection(Scope::default());

        assert_eq!(drain(&mut early).len(), 1);
        assert_eq!(drain(&mut late).len(), 0);
    }

    #[test]
    fn test_disconnect_does_not_block_others() {
        let hub = Hub::default();
        let gone = hub.register_connection(Scope::default());
        let mut stays = hub.register_connection(Scope::default());

        assert!(hub.unregister_connection(gone.id()));
        drop(gone);
        assert_eq!(hub.connection_count(), 1);

        let delivered = hub.handle_inbound_event(InboundEvent::OrderCreated(order("c-1", "Pending")));
        assert_eq!(delivered, 1);
        assert_eq!(drain(&mut stays).len(), 1);
    }

    #[test]
    fn test_dropped_handle_leaves_registry() {
        let hub = Hub::default();
        let gone = hub.register_connection(Scope::default());
        let id = gone.id().to_string();
        assert_eq!(hub.connection_count(), 1);

        drop(gone);

        assert_eq!(hub.connection_count(), 0);
        assert!(hub.connections().is_empty());
        assert!(!hub.unregister_connection(&id));
        assert_eq!(hub.handle_inbound_event(InboundEvent::OrderCreated(order("c-1", "Pending"))), 0);
    }

    #[test]
    fn test_handle_dropped_after_unregister() {
        let hub = Hub::default();
        let conn = hub.register_connection(Scope::default());
        let _other = hub.register_connection(Scope::default());

        assert!(hub.unregister_connection(conn.id()));
        drop(conn);
        assert_eq!(hub.connection_count(), 1);
    }

    #[test]
    fn test_delivered_counts_only_admitting_scopes() {
        let hub = Hub::default();
        let mut other_customer = hub.register_connection(Scope::customer("B"));

        let delivered = hub.handle_inbound_event(InboundEvent::OrderStatusChanged(order("A", "Rejected")));
        assert_eq!(delivered, 0);
        assert!(drain(&mut other_customer).is_empty());

        let mut everyone = hub.register_connection(Scope::default());
        let delivered = hub.handle_inbound_event(InboundEvent::OrderStatusChanged(order("A", "Rejected")));
        assert_eq!(delivered, 1);
        assert_eq!(drain(&mut everyone).len(), 1);
    }

    #[test]
    fn test_unregister_unknown_id() {
        let hub = Hub::default();
        assert!(!hub.unregister_connection("missing"));
    }

    #[test]
    fn test_broadcast_without_connections() {
        let hub = Hub::default();
        assert_eq!(hub.handle_inbound_event(InboundEvent::OrderCreated(json!({}))), 0);
    }

    #[test]
    fn test_customer_scope_filters_others() {
        let hub = Hub::default();
        let mut mine = hub.register_connection(Scope::customer("c-1"));
        let mut everyone = hub.register_connection(Scope::default());

        hub.handle_inbound_event(InboundEvent::OrderStatusChanged(order("c-2", "Rejected")));
        hub.handle_inbound_event(InboundEvent::OrderStatusChanged(order("c-1", "Rejected")));

        let mine = drain(&mut mine);
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].payload()["customerIdentifier"], "c-1");
        assert_eq!(drain(&mut everyone).len(), 2);
    }

    #[test]
    fn test_restaurant_scope() {
        let scope = Scope::restaurant("r-1");
        assert!(scope.admits(&OutboundEvent::OrderCreated(order("c-1", "Pending"))));
        assert!(!scope.admits(&OutboundEvent::OrderCreated(json!({ "restaurant": "r-2" }))));
        assert!(!scope.admits(&OutboundEvent::OrderCreated(json!({}))));
    }

    #[test]
    fn test_scope_coerces_numeric_identifier() {
        let scope = Scope::customer("77");
        assert!(scope.admits(&OutboundEvent::OrderUpdated(json!({ "customerIdentifier": 77 }))));
    }

    #[test]
    fn test_normalized_drops_blank_fields() {
        let scope = Scope {
            customer_identifier: Some("".into()),
            restaurant: Some(" ".into()),
        }
        .normalized();
        assert!(scope.is_unscoped());
    }

    #[test]
    fn test_lagging_connection_skips_ahead() {
        let hub = Hub::new(2);
        let mut slow = hub.register_connection(Scope::default());
        for n in 0..5 {
            hub.handle_inbound_event(InboundEvent::OrderCreated(json!({ "orderNo": n })));
        }
        let events = drain(&mut slow);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].payload()["orderNo"], 4);
    }

    #[test]
    fn test_egress_receives_local_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let hub = Hub::default().with_egress(tx);

        hub.handle_inbound_event(InboundEvent::OrderStatusChanged(order("c-1", "Pending")));
        hub.deliver(OutboundEvent::OrderCreated(json!({ "remote": true })));

        let forwarded = rx.try_recv().unwrap();
        assert_eq!(forwarded.name(), "order:updated");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_recv_waits_for_event() {
        let hub = Hub::default();
        let mut conn = hub.register_connection(Scope::default());
        let producer = hub.clone();

        tokio::spawn(async move {
            producer.handle_inbound_event(InboundEvent::OrderCreated(json!({ "orderNo": "9" })));
        });

        let event = conn.recv().await.unwrap();
        assert_eq!(event.payload()["orderNo"], "9");
    }
}
