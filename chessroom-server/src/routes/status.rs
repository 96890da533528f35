//! Status endpoint

use crate::session::SessionStatus;
use crate::state::ServerState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub session: SessionStatus,
}

pub async fn status_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<StatusResponse>, StatusCode> {
    let session = state.coordinator.status().await.map_err(|err| {
        tracing::error!(error = %err, "status unavailable");
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    Ok(Json(StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        session,
    }))
}
