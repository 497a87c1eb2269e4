mod config;
mod connection_handler;
pub mod matchmaker;
mod registry;
mod route;
pub mod websocket_listener;

pub use config::{ServerConfig, DEFAULT_PORT};
pub use connection_handler::{ConnectionHandler, GAME_OVER_DELAY};
pub use registry::{ConnectionEntry, EventSender, Registry};
pub use route::create_session_route;
pub use websocket_listener::Handshake;
