//! WebSocket handler for order event fan-out.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use relay_core::InboundEvent;
use tracing::{debug, warn};

use crate::hub::Scope;
use crate::state::AppState;

/// WebSocket upgrade handler.
///
/// `?customerIdentifier=` and `?restaurant=` narrow what the connection
/// receives; without them it receives every event.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(scope): Query<Scope>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, scope.normalized()))
}

/// Handle individual WebSocket connection.
async fn handle_socket(socket: WebSocket, state: AppState, scope: Scope) {
    let (mut sender, mut receiver) = socket.split();
    let mut connection = state.hub.register_connection(scope);
    let connection_id = connection.id().to_string();

    // Forward hub events to this client
    let send_id = connection_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = connection.recv().await {
            let json = match event.encode() {
                Ok(json) => json,
                Err(e) => {
                    warn!(connection_id = %send_id, error = %e, "Failed to encode event");
                    continue;
                }
            };
            debug!(connection_id = %send_id, event = event.name(), "Sending event to WebSocket client");
            if sender.send(Message::Text(json.into())).await.is_err() {
                debug!(connection_id = %send_id, "WebSocket send failed, client disconnected");
                break;
            }
        }
    });

    // Handle events emitted by this client
    let hub = state.hub.clone();
    let recv_id = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match InboundEvent::decode(text.as_str()) {
                    Ok(event) => {
                        debug!(connection_id = %recv_id, event = event.name(), "Received event from WebSocket client");
                        hub.handle_inbound_event(event);
                    }
                    Err(e) => {
                        warn!(connection_id = %recv_id, error = %e, "Dropping malformed frame");
                    }
                },
                Message::Close(_) => {
                    debug!(connection_id = %recv_id, "WebSocket client sent close frame");
                    break;
                }
                _ => {}
            }
        }
    });

    // Whichever side finishes first tears the connection down
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.hub.unregister_connection(&connection_id);
}
