use axum::{extract::State, Json};
use serde::Serialize;

use crate::api::AppState;
use crate::session::SessionState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub session: SessionState,
}

/// Liveness plus the state of the single client session
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        session: state.sessions.state().await,
    })
}
