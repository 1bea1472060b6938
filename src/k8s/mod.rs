//! Kubernetes integration module
//!
//! This module handles all interactions with the cluster:
//! - Resolving credentials and listing/watching pods
//! - Resuming watches across server-side timeouts
//! - Relaying pod creation and deletion to the live session

mod client;
mod retry_watch;
mod watcher;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ClusterClient, KubeClusterClient, PodWatchStream};
pub use retry_watch::RetryWatcher;
pub use watcher::ClusterWatcher;
