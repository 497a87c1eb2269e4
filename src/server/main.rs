use std::net::SocketAddr;
use std::sync::Arc;

use pairs_session::server::{create_session_route, Registry, ServerConfig};
use tracing::info;
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
pub async fn main() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pairs_session=debug"));

    fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true)
        .init();

    let config = Arc::new(ServerConfig::from_env());
    let registry = Arc::new(Registry::new());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = create_session_route(registry, config);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {addr}: {e}"));
    info!("listening on {addr}");

    axum::serve(listener, app)
        .await
        .unwrap_or_else(|e| panic!("server error: {e}"));
}
