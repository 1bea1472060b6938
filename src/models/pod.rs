use std::fmt;

use k8s_openapi::api::core::v1::Pod;
use serde::{Deserialize, Serialize};

/// A pod as it looked when the event carrying it was received.
///
/// Serializes as the full Kubernetes object so the client sees namespace,
/// name and status exactly as the API server reported them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PodSnapshot(Pod);

impl PodSnapshot {
    pub fn namespace(&self) -> &str {
        self.0.metadata.namespace.as_deref().unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.0.metadata.name.as_deref().unwrap_or_default()
    }

}

impl From<Pod> for PodSnapshot {
    fn from(pod: Pod) -> Self {
        Self(pod)
    }
}

impl fmt::Display for PodSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace(), self.name())
    }
}

/// Opaque resource version used to resume a watch without gaps or duplicates
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatchCursor(String);

impl WatchCursor {
    pub fn new(resource_version: impl Into<String>) -> Self {
        Self(resource_version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The API server treats an empty version or `"0"` as "any version",
    /// which cannot be resumed from without gaps.
    pub fn is_resumable(&self) -> bool {
        !self.0.is_empty() && self.0 != "0"
    }
}

impl fmt::Display for WatchCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of the initial list: every pod plus the cursor the watch starts from
#[derive(Debug, Clone)]
pub struct PodList {
    pub items: Vec<PodSnapshot>,
    pub cursor: WatchCursor,
}
