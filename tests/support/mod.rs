//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::Message as WsMessage;
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::{ErrorResponse, WatchEvent};
use serde_json::Value;

use kubeinvaders_backend::config::WatchSettings;
use kubeinvaders_backend::error::ClusterError;
use kubeinvaders_backend::k8s::{ClusterClient, PodWatchStream};
use kubeinvaders_backend::models::{PodList, PodSnapshot, WatchCursor};
use kubeinvaders_backend::session::{ConnectionManager, SessionHandle};

pub const LIST_VERSION: &str = "10";
pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Feeds one open watch round; dropping it ends the round like a server timeout
pub type Round = mpsc::UnboundedSender<WatchEvent<Pod>>;

/// Cluster whose watch rounds are driven live by the test
pub struct FakeCluster {
    pods: Vec<Pod>,
    cursors: Mutex<Vec<String>>,
    opened_tx: mpsc::UnboundedSender<Round>,
    opened_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Round>>,
    fail_list: AtomicBool,
    fail_watch: AtomicBool,
}

impl FakeCluster {
    pub fn new(pods: Vec<Pod>) -> Arc<Self> {
        let (opened_tx, opened_rx) = mpsc::unbounded();
        Arc::new(Self {
            pods,
            cursors: Mutex::new(Vec::new()),
            opened_tx,
            opened_rx: tokio::sync::Mutex::new(opened_rx),
            fail_list: AtomicBool::new(false),
            fail_watch: AtomicBool::new(false),
        })
    }

    pub fn fail_list(&self) {
        self.fail_list.store(true, Ordering::SeqCst);
    }

    pub fn fail_watch(&self) {
        self.fail_watch.store(true, Ordering::SeqCst);
    }

    /// Wait for the next `watch_pods` call and take control of its round
    pub async fn next_round(&self) -> Round {
        let mut opened = self.opened_rx.lock().await;
        tokio::time::timeout(TIMEOUT, opened.next())
            .await
            .expect("no watch round opened")
            .expect("cluster dropped")
    }

    pub fn watch_cursors(&self) -> Vec<String> {
        self.cursors.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn list_pods(&self) -> Result<PodList, ClusterError> {
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
        if self.fail_watch.load(Ordering::SeqCst) {
            return Err(ClusterError::WatchSetup(api_error(500)));
        }

        let (tx, rx) = mpsc::unbounded();
        let _ = self.opened_tx.unbounded_send(tx);
        Ok(rx.map(Ok).boxed())
    }
}

pub fn api_error(code: u16) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("fake failure {code}"),
        reason: "InternalError".to_string(),
        code,
    })
}

pub fn pod(name: &str, version: u64) -> Pod {
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

pub fn settings() -> WatchSettings {
    WatchSettings {
        restart_delay: Duration::ZERO,
        ..WatchSettings::default()
    }
}

/// In-memory client end of a session
pub struct TestClient {
    pub handle: SessionHandle,
    outbound: mpsc::UnboundedReceiver<WsMessage>,
    inbound: mpsc::UnboundedSender<Result<WsMessage, axum::Error>>,
}

impl TestClient {
    pub async fn connect(manager: &Arc<ConnectionManager>) -> Self {
        let (out_tx, out_rx) = mpsc::unbounded();
        let (in_tx, in_rx) = mpsc::unbounded();
        let handle = manager
            .attach(out_tx.sink_map_err(|e| axum::Error::new(e)), in_rx)
            .await;
        Self {
            handle,
            outbound: out_rx,
            inbound: in_tx,
        }
    }

    pub fn send_text(&self, text: &str) {
        self.inbound
            .unbounded_send(Ok(WsMessage::Text(text.to_string())))
            .unwrap();
    }

    pub fn send_frame(&self, frame: WsMessage) {
        self.inbound.unbounded_send(Ok(frame)).unwrap();
    }

    /// Next JSON frame; `None` once the server has closed the socket
    pub async fn recv(&mut self) -> Option<Value> {
        let frame = tokio::time::timeout(TIMEOUT, self.outbound.next())
            .await
            .expect("timed out waiting for frame")?;
        match frame {
            WsMessage::Text(text) => Some(serde_json::from_str(&text).unwrap()),
            other => panic!("unexpected frame {other:?}"),
        }
    }

    pub async fn recv_type(&mut self, expected: &str) -> Value {
        let message = self.recv().await.expect("socket closed");
        assert_eq!(message["type"], expected, "unexpected message {message}");
        message
    }

    /// Asserts nothing arrives for a short while
    pub async fn assert_quiet(&mut self) {
        let next = tokio::time::timeout(Duration::from_millis(100), self.outbound.next()).await;
        assert!(next.is_err(), "unexpected frame {:?}", next);
    }

    /// Asserts the server closes the socket without sending anything else
    pub async fn assert_closed(&mut self) {
        assert!(self.recv().await.is_none());
    }
}
