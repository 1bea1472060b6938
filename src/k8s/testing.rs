//! In-memory cluster for unit tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::{ErrorResponse, WatchEvent};
use serde_json::json;

use super::client::{ClusterClient, PodWatchStream};
use crate::error::ClusterError;
use crate::models::{PodList, PodSnapshot, WatchCursor};

pub(crate) const LIST_VERSION: &str = "10";

type Hook = Box<dyn FnOnce() + Send>;

/// Cluster whose list result and watch rounds are scripted up front.
///
/// Each `watch_pods` call consumes one scripted round; the round's stream
/// ends after its events, like a server-side timeout. Once the script is
/// exhausted, rounds stay open forever.
pub(crate) struct ScriptedCluster {
    pods: Vec<Pod>,
    rounds: Mutex<VecDeque<Vec<WatchEvent<Pod>>>>,
    cursors: Mutex<Vec<String>>,
    fail_list: AtomicBool,
    fail_watch: AtomicBool,
    on_list: Mutex<Option<Hook>>,
    on_watch: Mutex<Option<Hook>>,
}

impl ScriptedCluster {
    pub fn new(pods: Vec<Pod>) -> Self {
        Self {
            pods,
            rounds: Mutex::new(VecDeque::new()),
            cursors: Mutex::new(Vec::new()),
            fail_list: AtomicBool::new(false),
            fail_watch: AtomicBool::new(false),
            on_list: Mutex::new(None),
            on_watch: Mutex::new(None),
        }
    }

    pub fn push_round(&self, events: Vec<WatchEvent<Pod>>) {
        self.rounds.lock().unwrap().push_back(events);
    }

    pub fn fail_list(&self) {
        self.fail_list.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_watch(&self) {
        self.fail_watch.store(true, Ordering::SeqCst);
    }

    /// Run `hook` while the pod list is being fetched
    pub fn on_list(&self, hook: impl FnOnce() + Send + 'static) {
        *self.on_list.lock().unwrap() = Some(Box::new(hook));
    }

    /// Run `hook` when the first watch round is opened
    pub fn on_watch(&self, hook: impl FnOnce() + Send + 'static) {
        *self.on_watch.lock().unwrap() = Some(Box::new(hook));
    }

    /// Cursors passed to `watch_pods`, in call order
    pub fn watch_cursors(&self) -> Vec<String> {
        self.cursors.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClusterClient for ScriptedCluster {
    async fn list_pods(&self) -> Result<PodList, ClusterError> {
        if let Some(hook) = self.on_list.lock().unwrap().take() {
            hook();
        }
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(ClusterError::List(api_error(500)));
        }
        Ok(PodList {
            items: self.pods.iter().cloned().map(PodSnapshot::from).collect(),
            cursor: WatchCursor::new(LIST_VERSION),
        })
    }

    async fn watch_pods(
        &self,
        cursor: &WatchCursor,
        _timeout_secs: u32,
    ) -> Result<PodWatchStream, ClusterError> {
        self.cursors.lock().unwrap().push(cursor.to_string());

        if self.fail_watch.swap(false, Ordering::SeqCst) {
            return Err(ClusterError::WatchSetup(api_error(500)));
        }

        let round = self.rounds.lock().unwrap().pop_front();
        // Hook runs after the round is taken so its events are already queued
        if let Some(hook) = self.on_watch.lock().unwrap().take() {
            hook();
        }

        Ok(match round {
            Some(events) => stream::iter(events.into_iter().map(Ok)).boxed(),
            None => stream::pending().boxed(),
        })
    }
}

pub(crate) fn api_error(code: u16) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("scripted failure {code}"),
        reason: "InternalError".to_string(),
        code,
    })
}

pub(crate) fn pod(name: &str, version: u64) -> Pod {
    Pod {
        metadata: ObjectMeta {
            namespace: Some("default".to_string()),
            name: Some(name.to_string()),
            resource_version: Some(version.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub(crate) fn added(name: &str, version: u64) -> WatchEvent<Pod> {
    WatchEvent::Added(pod(name, version))
}

pub(crate) fn modified(name: &str, version: u64) -> WatchEvent<Pod> {
    WatchEvent::Modified(pod(name, version))
}

pub(crate) fn deleted(name: &str, version: u64) -> WatchEvent<Pod> {
    WatchEvent::Deleted(pod(name, version))
}

pub(crate) fn bookmark(version: u64) -> WatchEvent<Pod> {
    let bookmark = serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {"resourceVersion": version.to_string()}
    }))
    .unwrap();
    WatchEvent::Bookmark(bookmark)
}

pub(crate) fn gone() -> WatchEvent<Pod> {
    WatchEvent::Error(ErrorResponse {
        status: "Failure".to_string(),
        message: "too old resource version".to_string(),
        reason: "Expired".to_string(),
        code: 410,
    })
}
