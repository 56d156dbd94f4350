//! Command-line arguments for the `kubestate` binary

use anyhow::{Context, Result};
use clap::Parser;
use kubestate_config::{Config, ConfigLoader, Validator};
use std::path::PathBuf;

/// Command-line arguments
///
/// Flags win over `KUBESTATE_*` variables, which win over the file.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "kubestate", version, about = "Cluster object state as Prometheus metrics")]
pub struct Args {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, env = "KUBESTATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Comma-separated kinds to collect
    #[arg(long, value_delimiter = ',')]
    pub collectors: Option<Vec<String>>,

    /// Comma-separated namespaces to watch (all when empty)
    #[arg(long, value_delimiter = ',')]
    pub namespaces: Option<Vec<String>>,

    /// Base URL of the cluster API server
    #[arg(long)]
    pub apiserver: Option<String>,

    /// File holding the bearer token
    #[arg(long)]
    pub token_file: Option<PathBuf>,

    /// Log level or filter directive
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format: pretty, compact or json
    #[arg(long)]
    pub log_format: Option<String>,

    /// Never gzip the feed
    #[arg(long)]
    pub disable_gzip: bool,

    /// Log label-schema defects found while serving the feed
    #[arg(long)]
    pub validate_output: bool,
}

impl Args {
    /// Load the file and environment layers, apply flags and validate
    pub async fn load_config(&self) -> Result<Config> {
        let mut config = ConfigLoader::without_validation()
            .load_with_overrides(self.config.as_deref())
            .await
            .context("Failed to load configuration")?;
        self.apply(&mut config);
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Overlay the flags that were given onto `config`
    pub fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(collectors) = &self.collectors {
            config.collectors.enabled = collectors.clone();
        }
        if let Some(namespaces) = &self.namespaces {
            config.collectors.namespaces = namespaces
                .iter()
                .filter(|ns| !ns.is_empty())
                .cloned()
                .collect();
        }
        if let Some(apiserver) = &self.apiserver {
            config.apiserver.url = apiserver.clone();
        }
        if let Some(token_file) = &self.token_file {
            config.apiserver.token_file = Some(token_file.clone());
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.observability.log_format = format.clone();
        }
        if self.disable_gzip {
            config.server.enable_gzip = false;
        }
        if self.validate_output {
            config.server.validate_output = true;
        }
    }
}
