use crate::server::{websocket_listener, Handshake, Registry, ServerConfig};
use axum::extract::{Query, WebSocketUpgrade};
use axum::{routing::get, Router};
use std::sync::Arc;

pub fn create_session_route(registry: Arc<Registry>, config: Arc<ServerConfig>) -> Router {
    Router::new().route(
        "/session",
        get(move |ws: WebSocketUpgrade, Query(handshake): Query<Handshake>| {
            websocket_listener::handle_websocket(ws, handshake, registry.clone(), config.clone())
        }),
    )
}
