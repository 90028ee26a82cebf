//! Router assembly and serving.

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use hubsub_broker::engine::Broker;

use crate::{http, websocket};

#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<Broker>,
}

/// One router carries both surfaces: the `/ws` session upgrade and the
/// synchronous management API.
pub fn build_router(broker: Arc<Broker>) -> Router {
    Router::new()
        .route("/ws", get(websocket::ws_handler))
        .route("/topics", post(http::create_topic).get(http::list_topics))
        .route("/topics/{name}", delete(http::delete_topic))
        .route("/health", get(http::health))
        .route("/stats", get(http::stats))
        .with_state(AppState { broker })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn serve(listener: TcpListener, broker: Arc<Broker>) -> std::io::Result<()> {
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, build_router(broker)).await
}
