//! Server state shared across request handlers

use crate::coordinator::CoordinatorHandle;
use crate::session::Session;
use crate::ServerConfig;
use chessroom_core::{Clock, RulesError, StandardChess};

/// Server-wide shared state
///
/// Handlers only ever hold the coordinator handle; the session itself lives
/// inside the coordinator task.
pub struct ServerState {
    pub coordinator: CoordinatorHandle,
}

impl ServerState {
    /// Spawn a coordinator around a fresh standard session
    pub fn new() -> Self {
        Self {
            coordinator: CoordinatorHandle::spawn(Session::new()),
        }
    }

    /// Build the session described by `config` and spawn its coordinator
    pub fn from_config(config: &ServerConfig) -> Result<Self, RulesError> {
        let session = build_session(config)?;
        Ok(Self {
            coordinator: CoordinatorHandle::spawn(session),
        })
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

fn build_session(config: &ServerConfig) -> Result<Session, RulesError> {
    let session = match &config.start_position {
        Some(fen) => Session::from_encoded(StandardChess, fen)?,
        None => Session::new(),
    };
    Ok(match config.clock {
        Some(budget) => session.with_clock(Clock::new(budget, config.tick)),
        None => session,
    })
}
