use crate::humanize::ByteSize;
use crate::registry::DrainPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

/// Main-thread side: teardown, synchronous loads, capture limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatcherConfig {
    /// Sleep between checks while teardown waits for outstanding guards
    #[serde(default = "default_drain_poll_interval_ms")]
    pub drain_poll_interval_ms: u64,
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
    /// Panic when teardown times out instead of leaving the job to its last guard
    #[serde(default = "default_fatal_on_drain_timeout")]
    pub fatal_on_drain_timeout: bool,
    #[serde(default = "default_sync_poll_interval_ms")]
    pub sync_poll_interval_ms: u64,
    /// Upper bound for a hook-captured body
    #[serde(default = "default_max_capture_bytes")]
    pub max_capture_bytes: ByteSize,
}

impl DispatcherConfig {
    pub fn drain_policy(&self) -> DrainPolicy {
        DrainPolicy {
            poll_interval: Duration::from_millis(self.drain_poll_interval_ms),
            timeout: Duration::from_millis(self.drain_timeout_ms),
        }
    }

    pub fn sync_poll_interval(&self) -> Duration {
        Duration::from_millis(self.sync_poll_interval_ms)
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            drain_poll_interval_ms: default_drain_poll_interval_ms(),
            drain_timeout_ms: default_drain_timeout_ms(),
            fatal_on_drain_timeout: default_fatal_on_drain_timeout(),
            sync_poll_interval_ms: default_sync_poll_interval_ms(),
            max_capture_bytes: default_max_capture_bytes(),
        }
    }
}

fn default_drain_poll_interval_ms() -> u64 {
    20
}

fn default_drain_timeout_ms() -> u64 {
    5_000
}

fn default_fatal_on_drain_timeout() -> bool {
    true
}

fn default_sync_poll_interval_ms() -> u64 {
    5
}

fn default_max_capture_bytes() -> ByteSize {
    ByteSize(64 * 1024 * 1024) // 64 MB
}

/// I/O side: worker threads and HTTP client settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    #[serde(default = "default_io_threads")]
    pub io_threads: usize,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Route every load through this proxy (e.g. `http://proxy:8080`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            io_threads: default_io_threads(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            user_agent: default_user_agent(),
            max_redirects: default_max_redirects(),
            proxy: None,
        }
    }
}

fn default_io_threads() -> usize {
    4
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

fn default_user_agent() -> String {
    format!("loadbox/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_redirects() -> usize {
    10
}
