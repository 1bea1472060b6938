//! KubeInvaders Backend Library
//!
//! Relays Kubernetes pod creation and deletion to a single game client over a
//! WebSocket.

pub mod api;
pub mod config;
pub mod error;
pub mod k8s;
pub mod models;
pub mod session;

use axum::http::{header, Method};
use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::api::AppState;

/// Create the application router with the given state
pub fn create_router(state: AppState) -> Router {
    let static_dir = state.config.static_dir().map(str::to_string);

    let router = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        // WebSocket
        .route("/ws", get(api::ws::ws_handler))
        // Metrics (Prometheus)
        .route("/metrics", get(api::metrics::metrics_handler));

    // Game client bundle
    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
}

/// The game client may be served from any origin
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
}
