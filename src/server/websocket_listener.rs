use crate::model::ClientEvent;
use crate::server::{ConnectionHandler, Registry, ServerConfig};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// Handshake payload, carried as query parameters on the upgrade
/// request: the identity token is mandatory, the admin credential
/// optional.
#[derive(Debug, Deserialize)]
pub struct Handshake {
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default)]
    pub admin: Option<String>,
}

pub async fn handle_websocket(
    ws: WebSocketUpgrade,
    handshake: Handshake,
    registry: Arc<Registry>,
    config: Arc<ServerConfig>,
) -> Response {
    let identity = match handshake.identity {
        Some(identity) if !identity.trim().is_empty() => identity,
        _ => {
            log::warn!("refusing connection without identity token");
            return (StatusCode::UNAUTHORIZED, "identity token required").into_response();
        }
    };

    ws.on_upgrade(move |socket| listen(socket, registry, config, identity, handshake.admin))
        .into_response()
}

async fn listen(
    socket: WebSocket,
    registry: Arc<Registry>,
    config: Arc<ServerConfig>,
    identity: String,
    admin_credential: Option<String>,
) {
    let (ws_sender, ws_receiver) = socket.split();
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    let handler = match ConnectionHandler::admit(
        registry,
        config,
        &identity,
        admin_credential.as_deref(),
        tx,
    ) {
        Ok(handler) => handler,
        Err(e) => {
            log::error!("failed to admit connection {identity}: {e}");
            return;
        }
    };

    let sender_task = handle_outgoing_messages(rx, ws_sender);
    let receiver_task = handle_incoming_messages(ws_receiver, &handler);

    tokio::select! {
        _ = sender_task => {
            log::info!("sender task completed for {}", handler.connection_id());
        }
        _ = receiver_task => {
            log::info!("receiver task completed for {}", handler.connection_id());
        }
    }

    if let Err(e) = handler.disconnect() {
        log::error!("failed to disconnect {}: {e}", handler.connection_id());
    }
}

async fn handle_outgoing_messages(
    mut rx: UnboundedReceiver<Message>,
    mut ws_sender: SplitSink<WebSocket, Message>,
) {
    while let Some(message) = rx.recv().await {
        if let Err(e) = ws_sender.send(message).await {
            log::error!("failed to send message: {e}");
            break;
        }
    }
}

async fn handle_incoming_messages(
    mut receiver: SplitStream<WebSocket>,
    handler: &ConnectionHandler,
) {
    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientEvent::parse(&text) {
                Ok(event) => {
                    if let Err(e) = handler.handle_event(event) {
                        log::error!("failed to handle event from {}: {e}", handler.connection_id());
                    }
                }
                Err(e) => {
                    // malformed or unknown events are dropped, never fatal
                    log::warn!("{e} from {}", handler.connection_id());
                }
            },
            Ok(Message::Close(_)) => {
                log::info!("client closed connection {}", handler.connection_id());
                break;
            }
            Ok(_) => {}
            Err(e) => {
                log::error!("failed to receive message: {e}");
                break;
            }
        }
    }
}
