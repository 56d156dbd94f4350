//! Shared state of the feed server

use kubestate_collectors::Collector;
use kubestate_config::ServerConfig;
use kubestate_metrics::TelemetryRegistry;

/// Shared application state
#[derive(Debug)]
pub struct AppState {
    /// Collectors whose stores make up the feed, in output order
    pub collectors: Vec<Collector>,

    /// Self-telemetry served on `/telemetry`
    pub telemetry: TelemetryRegistry,

    /// Compress the feed for clients that accept gzip
    pub enable_gzip: bool,

    /// Check each scrape for label-schema defects
    pub validate_output: bool,
}

impl AppState {
    /// Create new app state with gzip enabled and validation off
    pub fn new(collectors: Vec<Collector>, telemetry: TelemetryRegistry) -> Self {
        Self {
            collectors,
            telemetry,
            enable_gzip: true,
            validate_output: false,
        }
    }

    /// Take the feed switches from the server configuration
    pub fn with_server_config(mut self, config: &ServerConfig) -> Self {
        self.enable_gzip = config.enable_gzip;
        self.validate_output = config.validate_output;
        self
    }
}
