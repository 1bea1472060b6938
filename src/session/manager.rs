//! Single-client session ownership
//!
//! [`ConnectionManager`] holds at most one live [`Session`] behind one lock.
//! Every write to the socket and every change to the session goes through
//! that lock, so frames are never interleaved and a replacement is observed
//! atomically: the previous socket is closed and its scope cancelled before
//! the next session is published.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::reader::read_loop;
use crate::config::WatchSettings;
use crate::error::{SessionError, SessionResult};
use crate::k8s::{ClusterClient, ClusterWatcher};
use crate::models::ServerMessage;

type FrameSink = Box<dyn Sink<WsMessage, Error = axum::Error> + Send + Unpin>;

/// The live connection: its write half and the scope its tasks run under
struct Session {
    generation: u64,
    sink: FrameSink,
    scope: CancellationToken,
}

impl Session {
    async fn close(mut self) {
        self.scope.cancel();
        if let Err(e) = self.sink.close().await {
            warn!(generation = self.generation, error = %e, "Error closing socket");
        }
    }
}

/// Observable state of the single session slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SessionState {
    Disconnected,
    Connected { generation: u64 },
}

pub struct ConnectionManager {
    session: Mutex<Option<Session>>,
    generations: AtomicU64,
    cluster: Arc<dyn ClusterClient>,
    settings: WatchSettings,
}

impl ConnectionManager {
    pub fn new(cluster: Arc<dyn ClusterClient>, settings: WatchSettings) -> Self {
        Self {
            session: Mutex::new(None),
            generations: AtomicU64::new(0),
            cluster,
            settings,
        }
    }

    /// Take over an upgraded socket, replacing any existing session
    pub async fn accept(self: &Arc<Self>, socket: WebSocket) -> SessionHandle {
        let (sink, stream) = socket.split();
        self.attach(sink, stream).await
    }

    /// Publish a new session over `sink`/`stream` and start its watcher and
    /// reader tasks.
    pub async fn attach<S, R>(self: &Arc<Self>, sink: S, stream: R) -> SessionHandle
    where
        S: Sink<WsMessage, Error = axum::Error> + Send + Unpin + 'static,
        R: Stream<Item = Result<WsMessage, axum::Error>> + Send + Unpin + 'static,
    {
        let handle = {
            let mut current = self.session.lock().await;

            if let Some(previous) = current.take() {
                info!(
                    generation = previous.generation,
                    "Replacing existing connection with new one"
                );
                previous.close().await;
            }

            let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
            let scope = CancellationToken::new();
            *current = Some(Session {
                generation,
                sink: Box::new(sink),
                scope: scope.clone(),
            });

            SessionHandle {
                generation,
                scope,
                manager: Arc::clone(self),
            }
        };

        metrics::increment_counter!("kubeinvaders_sessions_accepted_total");
        info!(generation = handle.generation, "Client connected");

        if let Err(e) = handle.send(ServerMessage::connected()).await {
            warn!(generation = handle.generation, error = %e, "Error sending welcome message");
        }

        let watcher = ClusterWatcher::new(self.cluster.clone(), handle.clone(), self.settings.clone());
        tokio::spawn(watcher.run());
        tokio::spawn(read_loop(handle.clone(), stream));

        handle
    }

    /// Send to whichever session is live
    pub async fn send(&self, message: ServerMessage) -> SessionResult<()> {
        self.write(None, &message).await
    }

    /// Tear down `generation` if it is still the live session.
    ///
    /// No-op for a generation that was already torn down or replaced.
    pub async fn teardown(&self, generation: u64) {
        let mut current = self.session.lock().await;
        if !matches!(current.as_ref(), Some(s) if s.generation == generation) {
            return;
        }
        if let Some(session) = current.take() {
            info!(generation, "Client disconnected");
            session.close().await;
        }
    }

    pub async fn state(&self) -> SessionState {
        match self.session.lock().await.as_ref() {
            Some(session) => SessionState::Connected {
                generation: session.generation,
            },
            None => SessionState::Disconnected,
        }
    }

    async fn write(&self, generation: Option<u64>, message: &ServerMessage) -> SessionResult<()> {
        let frame = serde_json::to_string(message)?;

        let mut current = self.session.lock().await;
        let session = match current.as_mut() {
            None => return Err(SessionError::NotConnected),
            Some(session) => session,
        };
        if let Some(expected) = generation.filter(|g| *g != session.generation) {
            return Err(SessionError::StaleGeneration(expected));
        }

        match session.sink.send(WsMessage::Text(frame)).await {
            Ok(()) => {
                metrics::increment_counter!(
                    "kubeinvaders_messages_sent_total",
                    "type" => message.label()
                );
                Ok(())
            }
            Err(e) => {
                // The socket handle is dropped here; cancelling the scope
                // stops the reader and watcher of this generation.
                if let Some(session) = current.take() {
                    session.scope.cancel();
                    warn!(generation = session.generation, error = %e, "Error sending message, session closed");
                }
                metrics::increment_counter!("kubeinvaders_send_failures_total");
                Err(SessionError::SendFailed(e))
            }
        }
    }
}

/// Capability to act on behalf of one session generation
#[derive(Clone)]
pub struct SessionHandle {
    generation: u64,
    scope: CancellationToken,
    manager: Arc<ConnectionManager>,
}

impl SessionHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Cancelled when this generation is torn down or replaced
    pub fn scope(&self) -> &CancellationToken {
        &self.scope
    }

    /// Send to this generation only; fails once it is no longer live
    pub async fn send(&self, message: ServerMessage) -> SessionResult<()> {
        self.manager.write(Some(self.generation), &message).await
    }

    pub async fn teardown(&self) {
        self.manager.teardown(self.generation).await;
    }
}
