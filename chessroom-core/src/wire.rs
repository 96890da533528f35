//! JSON wire events exchanged over each connection
//!
//! Every frame is an object `{"event": <name>, "data": <payload>}`.

use crate::board::Square;
use crate::pieces::{Color, PieceKind};
use crate::RulesError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A client's proposed move, not yet validated
///
/// Squares stay as raw strings so malformed input reaches the rules engine
/// and is rejected there like any other illegal move.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveIntent {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<String>,
}

impl MoveIntent {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            promotion: None,
        }
    }

    pub fn with_promotion(mut self, promotion: impl Into<String>) -> Self {
        self.promotion = Some(promotion.into());
        self
    }

    /// Decode an untrusted `move-intent` payload
    pub fn from_payload(payload: &Value) -> Result<Self, RulesError> {
        serde_json::from_value(payload.clone())
            .map_err(|e| RulesError::MalformedPayload(e.to_string()))
    }

    pub fn to_payload(&self) -> Value {
        serde_json::json!(self)
    }
}

/// Metadata of an accepted move
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    /// Side that made the move
    pub color: Color,
    pub from: Square,
    pub to: Square,
    pub piece: PieceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured: Option<PieceKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<PieceKind>,
    /// Standard algebraic notation
    pub san: String,
}

/// Server to client events
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Seat granted
    RoleAssigned(Color),
    /// No seat available
    SpectatorAssigned,
    /// An accepted move, for history and captured-piece bookkeeping
    MoveApplied(MoveRecord),
    /// Authoritative FEN of the current position
    StateSnapshot(String),
    /// The submitter's move was refused; carries the original payload
    MoveRejected(Value),
    /// Terminal notice with a human-readable reason
    GameEnded(String),
}

/// Client to server events
///
/// Decoding goes through [`ClientFrame`] so a `move-intent` without `data`
/// still arrives, as a `null` payload that the session rejects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
#[serde(from = "ClientFrame")]
pub enum ClientEvent {
    /// Raw move payload; decoded with [`MoveIntent::from_payload`]
    MoveIntent(Value),
    /// Seated player concedes
    Resign,
}

impl ClientEvent {
    pub fn move_intent(intent: &MoveIntent) -> Self {
        ClientEvent::MoveIntent(intent.to_payload())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ClientEventKind {
    MoveIntent,
    Resign,
}

/// Inbound envelope with an optional payload
#[derive(Deserialize)]
struct ClientFrame {
    event: ClientEventKind,
    #[serde(default)]
    data: Value,
}

impl From<ClientFrame> for ClientEvent {
    fn from(frame: ClientFrame) -> Self {
        match frame.event {
            ClientEventKind::MoveIntent => ClientEvent::MoveIntent(frame.data),
            ClientEventKind::Resign => ClientEvent::Resign,
        }
    }
}
