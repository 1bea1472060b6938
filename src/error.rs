//! Error types shared across the backend

use std::time::Duration;

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while talking to the Kubernetes API
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Cluster credentials could not be resolved; fatal at startup.
    #[error("failed to resolve cluster credentials: {0}")]
    Config(#[source] BoxError),

    #[error("failed to list pods: {0}")]
    List(#[source] kube::Error),

    #[error("pod list did not complete within {0:?}")]
    ListTimeout(Duration),

    #[error("pod list response carried no resource version")]
    MissingCursor,

    #[error("cannot watch from resource version {0:?}")]
    InvalidCursor(String),

    /// The first watch round could not be opened.
    #[error("failed to open pod watch: {0}")]
    WatchSetup(#[source] kube::Error),

    /// A watch round failed after the subscription was established.
    #[error("pod watch failed: {0}")]
    Watch(#[source] kube::Error),
}

impl ClusterError {
    pub fn config(err: impl Into<BoxError>) -> Self {
        Self::Config(err.into())
    }

    /// Whether the error means the cursor has been compacted away (HTTP 410)
    pub fn is_gone(&self) -> bool {
        match self {
            Self::List(kube::Error::Api(resp))
            | Self::WatchSetup(kube::Error::Api(resp))
            | Self::Watch(kube::Error::Api(resp)) => resp.code == 410,
            _ => false,
        }
    }
}

/// Errors returned by the session send path
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no client connected")]
    NotConnected,

    /// The caller belongs to a session generation that has been replaced.
    #[error("session generation {0} is no longer live")]
    StaleGeneration(u64),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    /// Writing to the socket failed; the session has been torn down.
    #[error("failed to send message: {0}")]
    SendFailed(#[source] axum::Error),
}

pub type SessionResult<T> = Result<T, SessionError>;
