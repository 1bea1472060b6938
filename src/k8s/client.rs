//! Kubernetes client for the pod relay

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use k8s_openapi::api::core::v1::Pod;
use kube::{
    api::{Api, ListParams, WatchParams},
    config::{KubeConfigOptions, Kubeconfig},
    core::WatchEvent,
    Client, Config,
};
use tracing::{debug, info, instrument};

use crate::error::ClusterError;
use crate::models::{PodList, PodSnapshot, WatchCursor};

/// One server-side watch round. Ends when the API server times the round out.
pub type PodWatchStream = BoxStream<'static, Result<WatchEvent<Pod>, ClusterError>>;

/// Cluster operations the relay needs.
///
/// Credential resolution and raw API access live behind this trait so the
/// session machinery can be driven by an in-memory cluster in tests.
#[async_trait]
pub trait ClusterClient: Send + Sync + 'static {
    /// Lists pods across all namespaces together with the list's resource
    /// version.
    async fn list_pods(&self) -> Result<PodList, ClusterError>;

    /// Opens a single watch round starting after `cursor`.
    async fn watch_pods(
        &self,
        cursor: &WatchCursor,
        timeout_secs: u32,
    ) -> Result<PodWatchStream, ClusterError>;
}

/// [`ClusterClient`] backed by kube-rs
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    /// Resolve credentials and build the client.
    ///
    /// An explicit kubeconfig path wins; otherwise the local kubeconfig is
    /// tried before the in-cluster service account.
    #[instrument(skip_all, fields(kubeconfig = ?kubeconfig_path))]
    pub async fn connect(kubeconfig_path: Option<&str>) -> Result<Self, ClusterError> {
        let config = match kubeconfig_path {
            Some(path) => {
                info!(path, "Using local config file");
                let kubeconfig = Kubeconfig::read_from(path).map_err(ClusterError::config)?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(ClusterError::config)?
            }
            None => Config::infer().await.map_err(ClusterError::config)?,
        };
        let client = Client::try_from(config).map_err(ClusterError::config)?;

        info!("Kubernetes client ready");

        Ok(Self { client })
    }

    /// Pods in every namespace
    fn pods(&self) -> Api<Pod> {
        Api::all(self.client.clone())
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    #[instrument(skip(self))]
    async fn list_pods(&self) -> Result<PodList, ClusterError> {
        let list = self
            .pods()
            .list(&ListParams::default())
            .await
            .map_err(ClusterError::List)?;

        let cursor = list
            .metadata
            .resource_version
            .filter(|rv| !rv.is_empty())
            .map(WatchCursor::new)
            .ok_or(ClusterError::MissingCursor)?;

        debug!(count = list.items.len(), %cursor, "Listed pods");

        Ok(PodList {
            items: list.items.into_iter().map(PodSnapshot::from).collect(),
            cursor,
        })
    }

    #[instrument(skip(self, cursor), fields(cursor = %cursor))]
    async fn watch_pods(
        &self,
        cursor: &WatchCursor,
        timeout_secs: u32,
    ) -> Result<PodWatchStream, ClusterError> {
        let params = WatchParams::default().timeout(timeout_secs);
        let stream = self
            .pods()
            .watch(&params, cursor.as_str())
            .await
            .map_err(ClusterError::WatchSetup)?;

        Ok(stream.map_err(ClusterError::Watch).boxed())
    }
}
