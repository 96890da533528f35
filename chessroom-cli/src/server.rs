//! Serve command - start the shared game server
//!
//! ## Architecture
//!
//! - Level 1: run() - orchestration
//! - Level 2: configure_server(), start_server()
//! - Level 3: argument validation

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::Args;

use chessroom_core::Position;
use chessroom_server::{run_server, ServerConfig};

// ============================================================================
// COMMAND ARGUMENTS
// ============================================================================

#[derive(Args)]
pub struct ServerArgs {
    /// Port number to listen on
    #[arg(long, default_value = "3000")]
    pub port: u16,

    /// Directory containing the board page and its assets
    #[arg(long, default_value = "public")]
    pub static_dir: PathBuf,

    /// Run a server-side clock with this many seconds per side
    #[arg(long)]
    pub clock_seconds: Option<u64>,

    /// Clock tick in milliseconds
    #[arg(long, default_value = "1000")]
    pub tick_ms: u64,

    /// Start from this FEN instead of the standard position
    #[arg(long)]
    pub fen: Option<String>,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run serve command
///
/// 1. Configure server
/// 2. Start server (blocking)
pub fn run(args: ServerArgs) -> Result<()> {
    let config = configure_server(&args)?;

    tracing::info!("Starting chessroom server on port {}", config.port);

    start_server(config)
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

/// Configure server from command arguments
fn configure_server(args: &ServerArgs) -> Result<ServerConfig> {
    validate_static_dir(&args.static_dir)?;
    let tick = validate_tick(args.tick_ms)?;
    if let Some(fen) = &args.fen {
        validate_fen(fen)?;
    }

    Ok(ServerConfig {
        port: args.port,
        static_dir: args.static_dir.to_string_lossy().to_string(),
        clock: args.clock_seconds.map(Duration::from_secs),
        tick,
        start_position: args.fen.clone(),
    })
}

/// Start the server (blocking)
fn start_server(config: ServerConfig) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async { run_server(config).await })
}

// ============================================================================
// LEVEL 3 - STEPS
// ============================================================================

/// Validate that static directory exists
fn validate_static_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        tracing::warn!(
            "Static directory does not exist: {}. Server will start but may not serve files.",
            path.display()
        );
    } else if !path.is_dir() {
        anyhow::bail!(
            "Static path exists but is not a directory: {}",
            path.display()
        );
    }

    Ok(())
}

fn validate_tick(tick_ms: u64) -> Result<Duration> {
    if tick_ms == 0 {
        anyhow::bail!("Clock tick must be at least 1ms");
    }
    Ok(Duration::from_millis(tick_ms))
}

fn validate_fen(fen: &str) -> Result<()> {
    Position::from_fen(fen)?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
