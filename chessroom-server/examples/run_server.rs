//! Example to run the Chessroom server standalone
//!
//! Run with: cargo run -p chessroom-server --example run_server

use chessroom_server::{run_server, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = ServerConfig::default();

    println!("Starting Chessroom server on port {}", config.port);
    println!("Static files from: {}", config.static_dir);
    println!("Connect a WebSocket client to ws://localhost:{}/ws", config.port);

    run_server(config).await
}
