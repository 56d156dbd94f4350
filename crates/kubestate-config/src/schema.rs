use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Feed HTTP server
    pub server: ServerConfig,

    /// Which kinds and namespaces to collect
    pub collectors: CollectorsConfig,

    /// Cluster API connection
    pub apiserver: ApiServerConfig,

    /// Watcher timing
    pub watcher: WatcherSettings,

    /// Logging
    pub observability: ObservabilityConfig,
}

/// Feed HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Listen host
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Gzip the feed when the client accepts it
    #[serde(default = "default_true")]
    pub enable_gzip: bool,

    /// Check every scrape for label-schema violations and log them
    #[serde(default)]
    pub validate_output: bool,
}

impl ServerConfig {
    /// `host:port` to bind
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Collector selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectorsConfig {
    /// Kind names to collect (e.g. `pods`, `configmaps`)
    #[serde(default = "default_collectors")]
    pub enabled: Vec<String>,

    /// Namespaces to watch; empty watches every namespace
    #[serde(default)]
    pub namespaces: Vec<String>,
}

/// Cluster API connection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiServerConfig {
    /// Base URL of the API server
    #[serde(default = "default_apiserver_url")]
    pub url: String,

    /// File holding a bearer token
    #[serde(default)]
    pub token_file: Option<PathBuf>,
}

/// Watcher timing, in config-friendly units
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatcherSettings {
    /// Forced relist interval (in seconds)
    #[serde(default = "default_resync_period")]
    pub resync_period_secs: u64,

    /// First retry delay after a failed list (in milliseconds)
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    /// Maximum retry delay (in milliseconds)
    #[serde(default = "default_backoff_max")]
    pub backoff_max_ms: u64,
}

impl WatcherSettings {
    pub fn resync_period(&self) -> Duration {
        Duration::from_secs(self.resync_period_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObservabilityConfig {
    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

/// Every kind collected when none are configured
pub const DEFAULT_COLLECTORS: &[&str] = &[
    "configmaps",
    "deployments",
    "namespaces",
    "nodes",
    "pods",
    "secrets",
    "services",
];

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_collectors() -> Vec<String> {
    DEFAULT_COLLECTORS.iter().map(|s| s.to_string()).collect()
}

fn default_apiserver_url() -> String {
    "https://kubernetes.default.svc".to_string()
}

fn default_resync_period() -> u64 {
    300
}

fn default_backoff_base() -> u64 {
    500
}

fn default_backoff_max() -> u64 {
    30_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: default_host(),
            port: default_port(),
            enable_gzip: true,
            validate_output: false,
        }
    }
}

impl Default for CollectorsConfig {
    fn default() -> Self {
        CollectorsConfig {
            enabled: default_collectors(),
            namespaces: Vec::new(),
        }
    }
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        ApiServerConfig {
            url: default_apiserver_url(),
            token_file: None,
        }
    }
}

impl Default for WatcherSettings {
    fn default() -> Self {
        WatcherSettings {
            resync_period_secs: default_resync_period(),
            backoff_base_ms: default_backoff_base(),
            backoff_max_ms: default_backoff_max(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        ObservabilityConfig {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}
