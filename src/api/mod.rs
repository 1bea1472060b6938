pub mod health;
pub mod metrics;
pub mod ws;

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::Config;
use crate::k8s::ClusterClient;
use crate::session::ConnectionManager;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sessions: Arc<ConnectionManager>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: Config, cluster: Arc<dyn ClusterClient>) -> Self {
        let sessions = ConnectionManager::new(cluster, config.watch_settings());
        Self {
            config,
            sessions: Arc::new(sessions),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
