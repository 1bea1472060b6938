use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// The API server rejects watch timeouts of 295s or more.
const MAX_WATCH_TIMEOUT_SECS: u32 = 294;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Explicit kubeconfig file; when unset credentials are inferred
    #[serde(default)]
    pub kubeconfig_path: Option<String>,

    #[serde(default = "default_list_timeout_secs")]
    pub list_timeout_secs: u64,

    #[serde(default = "default_watch_timeout_secs")]
    pub watch_timeout_secs: u32,

    #[serde(default = "default_watch_restart_delay_ms")]
    pub watch_restart_delay_ms: u64,

    /// Directory holding the game client bundle
    #[serde(default = "default_static_dir")]
    pub static_dir: Option<String>,

    #[serde(default)]
    pub watch_stalled_notify: bool,
}

fn default_port() -> u16 {
    8080
}

fn default_list_timeout_secs() -> u64 {
    10
}

fn default_watch_timeout_secs() -> u32 {
    290
}

fn default_watch_restart_delay_ms() -> u64 {
    1000
}

fn default_static_dir() -> Option<String> {
    Some("../dist".to_string())
}

/// Timing and behavior knobs for the per-session cluster watcher
#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub list_timeout: Duration,
    pub watch_timeout_secs: u32,
    pub restart_delay: Duration,
    pub notify_stalled: bool,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Config::default().watch_settings()
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::from_environment(config::Environment::default())
    }

    pub fn from_environment(env: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(env)
            .build()
            .context("failed to read configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("invalid configuration")?;

        Ok(Self {
            static_dir: config.static_dir().map(str::to_string),
            ..config
        })
    }

    /// Static bundle directory; an empty value disables file serving rather
    /// than serving the working directory
    pub fn static_dir(&self) -> Option<&str> {
        self.static_dir
            .as_deref()
            .map(str::trim)
            .filter(|dir| !dir.is_empty())
    }

    pub fn watch_settings(&self) -> WatchSettings {
        WatchSettings {
            list_timeout: Duration::from_secs(self.list_timeout_secs),
            watch_timeout_secs: self.watch_timeout_secs.clamp(1, MAX_WATCH_TIMEOUT_SECS),
            restart_delay: Duration::from_millis(self.watch_restart_delay_ms),
            notify_stalled: self.watch_stalled_notify,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            kubeconfig_path: None,
            list_timeout_secs: default_list_timeout_secs(),
            watch_timeout_secs: default_watch_timeout_secs(),
            watch_restart_delay_ms: default_watch_restart_delay_ms(),
            static_dir: default_static_dir(),
            watch_stalled_notify: false,
        }
    }
}
