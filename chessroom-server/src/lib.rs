//! Chessroom Server - authoritative session over WebSockets
//!
//! This crate provides the server side of a shared game:
//! - Session coordinator (seats, turn authority, move relay)
//! - Connection gateway (unicast and broadcast delivery)
//! - WebSocket endpoint and status API
//! - Static file serving for the board page

pub mod coordinator;
pub mod gateway;
mod routes;
pub mod session;
mod state;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::services::ServeDir;

pub use coordinator::{Connection, CoordinatorHandle};
pub use session::{ConnectionId, Delivery, Phase, Session, SessionStatus};
pub use state::ServerState;

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub static_dir: String,
    /// Per-side budget for a server-side clock; `None` leaves clocks to clients
    pub clock: Option<Duration>,
    /// Clock decrement period
    pub tick: Duration,
    /// FEN to start from instead of the standard position
    pub start_position: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            static_dir: "public".to_string(),
            clock: None,
            tick: chessroom_core::clock::DEFAULT_TICK,
            start_position: None,
        }
    }
}

/// Create the router with all routes
pub fn create_router(config: &ServerConfig, state: Arc<ServerState>) -> Router {
    let static_service = ServeDir::new(&config.static_dir);

    Router::new()
        // Live session socket
        .route("/ws", get(routes::ws::ws_handler))
        // Status endpoint
        .route("/api/status", get(routes::status::status_handler))
        // Shared state
        .with_state(state)
        // Board page and assets (must be last)
        .fallback_service(static_service)
}

/// Start the HTTP server
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = Arc::new(ServerState::from_config(&config)?);
    let router = create_router(&config, state);

    tracing::info!("Chessroom server starting on http://0.0.0.0:{}", config.port);
    tracing::info!("Static files served from: {}", config.static_dir);
    if let Some(budget) = config.clock {
        tracing::info!("Server clock enabled: {}s per side", budget.as_secs());
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
