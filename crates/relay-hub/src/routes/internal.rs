//! Internal endpoints used by the order service and operators.

use axum::{extract::State, http::StatusCode, Json};
use relay_core::InboundEvent;
use serde_json::{json, Value};
use tracing::info;

use crate::error::ApiError;
use crate::hub::ConnectionInfo;
use crate::state::AppState;

/// Receive an order event over HTTP and fan it out to all connections.
pub async fn emit(
    State(state): State<AppState>,
    body: String,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let event = InboundEvent::decode(&body)?;
    let name = event.name();
    info!(event = name, "Received internal emit, broadcasting to connections");

    let delivered = state.hub.handle_inbound_event(event);
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "event": name, "delivered": delivered })),
    ))
}

/// List active connections.
pub async fn connections(State(state): State<AppState>) -> Json<Vec<ConnectionInfo>> {
    Json(state.hub.connections())
}
