//! Hub subscription lifecycle.
//!
//! [`mount`] opens one WebSocket connection and spawns a reader that feeds
//! every frame through the [`EventFilter`]. [`ListenerHandle::unmount`]
//! stops the reader and closes the connection. Dropping the handle also
//! stops the reader.

use futures::StreamExt;
use relay_core::OutboundEvent;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ClientResult;
use crate::filter::EventFilter;
use crate::sink::NotificationSink;
use crate::store::CustomerStore;

type HubStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connect to the hub and start filtering events into `sink`.
pub async fn mount<S, K>(url: &str, filter: EventFilter<S>, sink: K) -> ClientResult<ListenerHandle>
where
    S: CustomerStore + 'static,
    K: NotificationSink,
{
    let (stream, _) = connect_async(url).await?;
    info!(url = %url, "Connected to order relay hub");

    let shutdown = CancellationToken::new();
    let task = tokio::spawn(run(stream, filter, sink, shutdown.clone()));

    Ok(ListenerHandle {
        shutdown,
        task: Some(task),
    })
}

/// Append a customer scope to a hub URL so the hub only sends this
/// customer's events.
pub fn scoped_url(url: &str, customer_identifier: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!(
        "{}{}customerIdentifier={}",
        url,
        separator,
        encode_query_value(customer_identifier)
    )
}

fn encode_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

async fn run<S, K>(mut stream: HubStream, filter: EventFilter<S>, mut sink: K, shutdown: CancellationToken)
where
    S: CustomerStore,
    K: NotificationSink,
{
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                if let Err(e) = stream.close(None).await {
                    debug!(error = %e, "Close handshake failed");
                }
                debug!("Listener unmounted");
                return;
            }
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => match OutboundEvent::decode(text.as_str()) {
                    Ok(event) => {
                        if let Some(notification) = filter.evaluate(&event) {
                            sink.notify(notification);
                        }
                    }
                    Err(e) => debug!(error = %e, "Ignoring undecodable frame"),
                },
                Some(Ok(Message::Close(_))) | None => {
                    info!("Hub closed the connection");
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "Hub connection failed");
                    return;
                }
            }
        }
    }
}

/// A mounted listener.
pub struct ListenerHandle {
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    /// Stop listening and close the connection.
    pub async fn unmount(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Wait until the hub ends the connection.
    ///
    /// Cancel safe: the reader is kept, so a later [`unmount`](Self::unmount)
    /// still waits for the close handshake.
    pub async fn closed(&mut self) {
        if let Some(task) = self.task.as_mut() {
            let _ = task.await;
            self.task = None;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::Notification;
    use relay_core::config::CorsConfig;
    use relay_core::{InboundEvent, NotifyKind};
    use relay_hub::{cors_layer, create_router, state::AppState, Hub};
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::{sleep, timeout};

    async fn start_hub() -> (Hub, String) {
        let hub = Hub::default();
        let app = create_router(
            AppState::new(hub.clone()),
            cors_layer(&CorsConfig::default()).unwrap(),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (hub, format!("ws://{}/ws", addr))
    }

    async fn wait_for_connections(hub: &Hub, expected: usize) {
        for _ in 0..100 {
            if hub.connection_count() == expected {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} connections, have {}", expected, hub.connection_count());
    }

    fn status_changed(customer: &str, status: &str, updated_at: &str) -> InboundEvent {
        InboundEvent::OrderStatusChanged(json!({
            "orderNo": "C-3",
            "customerIdentifier": customer,
            "status": status,
            "createdAt": "2024-05-01T12:00:00.000Z",
            "updatedAt": updated_at
        }))
    }

    #[test]
    fn test_scoped_url_encodes() {
        assert_eq!(
            scoped_url("ws://hub/ws", "a b&c"),
            "ws://hub/ws?customerIdentifier=a%20b%26c"
        );
        assert_eq!(
            scoped_url("ws://hub/ws?restaurant=r1", "c-1"),
            "ws://hub/ws?restaurant=r1&customerIdentifier=c-1"
        );
    }

    #[tokio::test]
    async fn test_listener_notifies_only_own_orders() {
        let (hub, url) = start_hub().await;
        let (tx, mut rx) = mpsc::unbounded_channel::<Notification>();

        let handle = mount(&url, EventFilter::new(MemoryStore::new("me")), tx)
            .await
            .unwrap();
        wait_for_connections(&hub, 1).await;

        hub.handle_inbound_event(status_changed("someone-else", "Rejected", "2024-05-01T12:00:00.000Z"));
        hub.handle_inbound_event(status_changed("me", "Pending", "2024-05-01T12:00:00.000Z"));
        hub.handle_inbound_event(status_changed("me", "Pending", "2024-05-01T12:00:05.000Z"));

        let notification = timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(notification.kind, NotifyKind::Success);
        assert_eq!(notification.order_no, "C-3");
        assert!(rx.try_recv().is_err());

        handle.unmount().await;
        wait_for_connections(&hub, 0).await;
    }

    #[tokio::test]
    async fn test_unmount_waits_after_interrupted_closed() {
        let (hub, url) = start_hub().await;
        let (tx, mut rx) = mpsc::unbounded_channel::<Notification>();

        let mut handle = mount(&url, EventFilter::new(MemoryStore::new("me")), tx)
            .await
            .unwrap();
        wait_for_connections(&hub, 1).await;

        tokio::select! {
            _ = handle.closed() => panic!("hub should still be up"),
            _ = sleep(Duration::from_millis(50)) => {}
        }
        assert!(!handle.is_finished());

        handle.unmount().await;
        // The reader owned the sink, so it is gone once unmount returns.
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
        wait_for_connections(&hub, 0).await;
    }

    #[tokio::test]
    async fn test_mount_fails_without_hub() {
        let result = mount(
            "ws://127.0.0.1:9/ws",
            EventFilter::new(MemoryStore::new("me")),
            crate::sink_fn(|_| {}),
        )
        .await;
        assert!(result.is_err());
    }
}
