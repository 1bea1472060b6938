use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kubeinvaders_backend::{
    api::AppState, config::Config, create_router, k8s::KubeClusterClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting KubeInvaders Backend");

    // Load configuration
    let config = Config::load()?;
    tracing::info!("Configuration loaded");

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install metrics recorder")?;

    // Cluster credentials are required; there is nothing to relay without them
    let cluster = KubeClusterClient::connect(config.kubeconfig_path.as_deref())
        .await
        .context("failed to create Kubernetes client")?;

    let state = AppState::new(config.clone(), Arc::new(cluster)).with_metrics(metrics);

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);
    tracing::info!("Connect to the WebSocket at ws://localhost:{}/ws", config.port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
