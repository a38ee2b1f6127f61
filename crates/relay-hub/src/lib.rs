//! Order Relay Hub
//!
//! Axum server that accepts WebSocket connections and fans order events out
//! to every connected client.

pub mod error;
pub mod hub;
pub mod routes;
pub mod state;
pub mod websocket;

use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use relay_core::config::{CorsConfig, ServerConfig};
use relay_core::{RelayError, RelayResult};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use hub::{ConnectionHandle, ConnectionInfo, Hub, Scope};
use state::AppState;

/// Build the CORS layer from configuration.
///
/// A `*` origin cannot be combined with credentials, so it disables them.
pub fn cors_layer(config: &CorsConfig) -> RelayResult<CorsLayer> {
    let methods = config
        .methods
        .iter()
        .map(|m| {
            Method::from_bytes(m.as_bytes())
                .map_err(|_| RelayError::config(format!("invalid CORS method: {}", m)))
        })
        .collect::<RelayResult<Vec<_>>>()?;

    let layer = CorsLayer::new()
        .allow_methods(methods)
        .allow_headers([CONTENT_TYPE]);

    let origin = config.origin.trim();
    if origin == "*" {
        return Ok(layer.allow_origin(Any));
    }

    let origin = HeaderValue::from_str(origin)
        .map_err(|_| RelayError::config(format!("invalid CORS origin: {}", origin)))?;
    Ok(layer
        .allow_origin(origin)
        .allow_credentials(config.credentials))
}

/// Create the application router.
pub fn create_router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/ws", get(websocket::ws_handler))
        .route("/health", get(routes::health::health))
        .route("/internal/emit", post(routes::internal::emit))
        .route("/internal/connections", get(routes::internal::connections))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Run the hub until Ctrl+C.
pub async fn run_server(hub: Hub, server: &ServerConfig, cors: &CorsConfig) -> anyhow::Result<()> {
    let app = create_router(AppState::new(hub), cors_layer(cors)?);

    let addr = format!("{}:{}", server.host, server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Order relay hub listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;
    Ok(())
}
