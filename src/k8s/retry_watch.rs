//! Resumable pod watch
//!
//! The API server ends every watch round after its timeout. [`RetryWatcher`]
//! hides that: it tracks the resource version of the last event it saw and
//! reopens the next round from there, so consumers see one continuous stream
//! with no gaps and no duplicates. Only an expired cursor (HTTP 410) or an
//! explicit stop ends the stream.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::core::WatchEvent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::{ClusterClient, PodWatchStream};
use crate::error::ClusterError;
use crate::models::WatchCursor;

const EVENT_BUFFER: usize = 32;

/// Handle to a running resumable watch
pub struct RetryWatcher {
    events: mpsc::Receiver<WatchEvent<Pod>>,
    stop: CancellationToken,
}

impl RetryWatcher {
    /// Open the subscription at `cursor`.
    ///
    /// The first round is opened before returning so that setup failures are
    /// reported to the caller instead of being retried.
    pub async fn start(
        client: Arc<dyn ClusterClient>,
        cursor: WatchCursor,
        timeout_secs: u32,
        restart_delay: Duration,
    ) -> Result<Self, ClusterError> {
        if !cursor.is_resumable() {
            return Err(ClusterError::InvalidCursor(cursor.to_string()));
        }

        let stream = client.watch_pods(&cursor, timeout_secs).await?;

        let (tx, events) = mpsc::channel(EVENT_BUFFER);
        let stop = CancellationToken::new();

        let task = RetryLoop {
            client,
            cursor,
            timeout_secs,
            restart_delay,
            tx,
            stop: stop.clone(),
        };
        tokio::spawn(task.run(stream));

        Ok(Self { events, stop })
    }

    /// Next event, or `None` once the subscription has ended
    pub async fn recv(&mut self) -> Option<WatchEvent<Pod>> {
        self.events.recv().await
    }

    pub fn stop(&self) {
        self.stop.cancel();
    }
}

impl Drop for RetryWatcher {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

enum RoundEnd {
    /// Server closed the round (timeout); resume from the cursor
    Closed,
    /// Transient failure; resume from the cursor
    Failed(String),
    /// Cursor expired; cannot resume
    Gone,
    Stopped,
}

struct RetryLoop {
    client: Arc<dyn ClusterClient>,
    cursor: WatchCursor,
    timeout_secs: u32,
    restart_delay: Duration,
    tx: mpsc::Sender<WatchEvent<Pod>>,
    stop: CancellationToken,
}

impl RetryLoop {
    async fn run(mut self, mut stream: PodWatchStream) {
        loop {
            match self.drain(&mut stream).await {
                RoundEnd::Stopped => {
                    debug!("Pod watch stopped");
                    return;
                }
                RoundEnd::Gone => {
                    warn!(cursor = %self.cursor, "Watch cursor expired, subscription ended");
                    return;
                }
                RoundEnd::Closed => {
                    debug!(cursor = %self.cursor, "Watch round ended");
                }
                RoundEnd::Failed(reason) => {
                    warn!(cursor = %self.cursor, %reason, "Watch round failed");
                }
            }

            stream = match self.reopen().await {
                Some(stream) => stream,
                None => return,
            };
        }
    }

    async fn drain(&mut self, stream: &mut PodWatchStream) -> RoundEnd {
        loop {
            let item = tokio::select! {
                biased;
                _ = self.stop.cancelled() => return RoundEnd::Stopped,
                item = stream.next() => item,
            };

            let event = match item {
                None => return RoundEnd::Closed,
                Some(Err(e)) if e.is_gone() => return RoundEnd::Gone,
                Some(Err(e)) => return RoundEnd::Failed(e.to_string()),
                Some(Ok(event)) => event,
            };

            let end = match &event {
                WatchEvent::Error(resp) if resp.code == 410 => Some(RoundEnd::Gone),
                WatchEvent::Error(resp) => Some(RoundEnd::Failed(resp.message.clone())),
                _ => None,
            };
            self.advance(&event);

            tokio::select! {
                biased;
                _ = self.stop.cancelled() => return RoundEnd::Stopped,
                sent = self.tx.send(event) => {
                    if sent.is_err() {
                        return RoundEnd::Stopped;
                    }
                }
            }

            if let Some(end) = end {
                return end;
            }
        }
    }

    fn advance(&mut self, event: &WatchEvent<Pod>) {
        let version = match event {
            WatchEvent::Added(pod) | WatchEvent::Modified(pod) | WatchEvent::Deleted(pod) => {
                pod.metadata.resource_version.as_deref()
            }
            WatchEvent::Bookmark(bookmark) => Some(bookmark.metadata.resource_version.as_str()),
            WatchEvent::Error(_) => None,
        };

        if let Some(version) = version.filter(|v| !v.is_empty()) {
            self.cursor = WatchCursor::new(version);
        }
    }

    async fn reopen(&mut self) -> Option<PodWatchStream> {
        loop {
            tokio::select! {
                biased;
                _ = self.stop.cancelled() => return None,
                _ = tokio::time::sleep(self.restart_delay) => {}
            }

            metrics::increment_counter!("kubeinvaders_watch_restarts_total");

            let opened = tokio::select! {
                biased;
                _ = self.stop.cancelled() => return None,
                opened = self.client.watch_pods(&self.cursor, self.timeout_secs) => opened,
            };

            match opened {
                Ok(stream) => {
                    info!(cursor = %self.cursor, "Resumed pod watch");
                    return Some(stream);
                }
                Err(e) if e.is_gone() => {
                    warn!(cursor = %self.cursor, "Watch cursor expired, subscription ended");
                    return None;
                }
                Err(e) => {
                    warn!(cursor = %self.cursor, error = %e, "Failed to reopen pod watch, retrying");
                }
            }
        }
    }
}
