//! Kubernetes Pod Watcher
//!
//! Relays pod creation and deletion to one session generation using
//! list-then-watch: the full list goes out first as `podList`, then the watch
//! starts from the list's own resource version.

use std::sync::Arc;

use kube::core::WatchEvent;
use tracing::{debug, error, info, instrument, warn};

use super::client::ClusterClient;
use super::retry_watch::RetryWatcher;
use crate::config::WatchSettings;
use crate::error::ClusterError;
use crate::models::{PodSnapshot, ServerMessage};
use crate::session::SessionHandle;

enum WatchEnd {
    Cancelled,
    Closed,
}

pub struct ClusterWatcher {
    client: Arc<dyn ClusterClient>,
    session: SessionHandle,
    settings: WatchSettings,
}

impl ClusterWatcher {
    pub fn new(client: Arc<dyn ClusterClient>, session: SessionHandle, settings: WatchSettings) -> Self {
        Self {
            client,
            session,
            settings,
        }
    }

    /// Run until the session's scope is cancelled or the subscription ends.
    ///
    /// List and watch setup failures end the watcher without retrying; the
    /// session itself stays up.
    #[instrument(skip_all, fields(generation = self.session.generation()))]
    pub async fn run(self) {
        info!("Starting Kubernetes pod watcher");

        let scope = self.session.scope().clone();

        let listed = tokio::select! {
            biased;
            _ = scope.cancelled() => {
                info!("Context cancelled before pod list completed");
                return;
            }
            listed = tokio::time::timeout(self.settings.list_timeout, self.client.list_pods()) => listed,
        };
        let list = match listed {
            Ok(Ok(list)) => list,
            Ok(Err(e)) => {
                error!(error = %e, "Error listing pods");
                return;
            }
            Err(_) => {
                let e = ClusterError::ListTimeout(self.settings.list_timeout);
                error!(error = %e, "Error listing pods");
                return;
            }
        };

        let cursor = list.cursor;
        info!(count = list.items.len(), %cursor, "Sending initial pod list");
        self.relay(ServerMessage::PodList { items: list.items }).await;

        // Replaced while listing or sending; do not open a watch round
        if scope.is_cancelled() {
            info!("Context cancelled, stopping pod watcher");
            return;
        }

        let mut watch = match RetryWatcher::start(
            self.client.clone(),
            cursor,
            self.settings.watch_timeout_secs,
            self.settings.restart_delay,
        )
        .await
        {
            Ok(watch) => watch,
            Err(e) => {
                error!(error = %e, "Error setting up watcher");
                return;
            }
        };

        let end = loop {
            let event = tokio::select! {
                biased;
                _ = scope.cancelled() => break WatchEnd::Cancelled,
                event = watch.recv() => event,
            };
            let Some(event) = event else {
                break WatchEnd::Closed;
            };
            // Buffered events from a replaced generation must not be relayed
            if scope.is_cancelled() {
                break WatchEnd::Cancelled;
            }

            let message = match event {
                WatchEvent::Added(pod) => {
                    let pod: PodSnapshot = pod.into();
                    info!(%pod, "Pod added");
                    ServerMessage::PodAdded { pod }
                }
                WatchEvent::Deleted(pod) => {
                    let pod: PodSnapshot = pod.into();
                    info!(%pod, "Pod deleted");
                    ServerMessage::PodDeleted { pod }
                }
                WatchEvent::Modified(_) => {
                    debug!("Ignoring pod modification");
                    continue;
                }
                WatchEvent::Bookmark(_) => continue,
                WatchEvent::Error(resp) => {
                    warn!(code = resp.code, message = %resp.message, "Received watch error");
                    continue;
                }
            };
            self.relay(message).await;
        };

        watch.stop();

        match end {
            WatchEnd::Cancelled => info!("Context cancelled, stopping pod watcher"),
            WatchEnd::Closed => {
                warn!("Pod subscription ended, no further pod events for this session");
                if self.settings.notify_stalled {
                    self.relay(ServerMessage::WatchStalled {
                        reason: "pod watch subscription ended".to_string(),
                    })
                    .await;
                }
            }
        }

        info!("Watcher stopped");
    }

    /// A failed frame is logged and skipped; only scope cancellation or the
    /// end of the subscription stops the loop.
    async fn relay(&self, message: ServerMessage) {
        let kind = message.kind().to_string();
        if let Err(e) = self.session.send(message).await {
            warn!(kind = %kind, error = %e, "Error sending message");
        }
    }
}
