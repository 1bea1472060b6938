//! WebSocket endpoint for the game client

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        State,
    },
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::api::AppState;

/// Upgrade the request and hand the socket to the session manager.
///
/// Only one client is served at a time; a new connection replaces the
/// current one. Requests that cannot be upgraded are logged and dropped
/// without touching the live session.
pub async fn ws_handler(
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            warn!(error = %rejection, "Error upgrading connection");
            return rejection.into_response();
        }
    };

    upgrade
        .on_failed_upgrade(|error: axum::Error| warn!(%error, "Error upgrading connection"))
        .on_upgrade(move |socket| async move {
            state.sessions.accept(socket).await;
        })
}
