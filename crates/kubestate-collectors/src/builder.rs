// Copyright (C) 2026  kubestate Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Collector assembly
//!
//! [`Builder`] turns a configuration (enabled kinds, namespaces) into running
//! watchers and the collectors that read their stores.
//!
//! # Examples
//!
//! ```rust,no_run
//! use kubestate_collectors::api::MockApi;
//! use kubestate_collectors::Builder;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let built = Builder::new()
//!         .with_enabled_collectors(["configmaps", "pods"])
//!         .with_namespaces(["default", "kube-system"])
//!         .with_api(Arc::new(MockApi::new()))
//!         .build()?;
//!
//!     for collector in &built.collectors {
//!         println!("{}: {} records", collector.name(), collector.emit().await.len());
//!     }
//!
//!     built.shutdown().await;
//!     Ok(())
//! }
//! ```

use crate::api::ResourceApi;
use crate::collector::Collector;
use crate::error::BuildError;
use crate::generators::{self, KindSpec};
use crate::watcher::{ResourceWatcher, WatcherConfig};
use kubestate_metrics::TelemetryRegistry;
use kubestate_store::MetricsStore;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Builder for collectors and their watchers
#[derive(Debug, Default)]
pub struct Builder {
    enabled: BTreeSet<String>,
    namespaces: Vec<String>,
    api: Option<Arc<dyn ResourceApi>>,
    watcher_config: WatcherConfig,
    telemetry: Option<TelemetryRegistry>,
    shutdown: CancellationToken,
}

impl Builder {
    /// Create a builder with nothing enabled
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the kinds to collect, by configuration name
    pub fn with_enabled_collectors<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enabled = kinds.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict namespaced kinds to these namespaces; empty means all
    pub fn with_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.namespaces.clear();
        for ns in namespaces {
            let ns = ns.into();
            if !self.namespaces.contains(&ns) {
                self.namespaces.push(ns);
            }
        }
        self
    }

    /// Remote API every watcher lists and watches through
    pub fn with_api(mut self, api: Arc<dyn ResourceApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Timing shared by every watcher
    pub fn with_watcher_config(mut self, config: WatcherConfig) -> Self {
        self.watcher_config = config;
        self
    }

    /// Report watcher activity to `telemetry`
    pub fn with_telemetry(mut self, telemetry: TelemetryRegistry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Stop every watcher when `token` is cancelled
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Construct one collector per known enabled kind and spawn its watchers
    ///
    /// Unknown kind names are logged and skipped. Must be called from within
    /// a tokio runtime.
    pub fn build(self) -> Result<BuiltCollectors, BuildError> {
        let api = self.api.clone().ok_or(BuildError::MissingApi)?;

        let mut collectors = Vec::new();
        let mut handles = Vec::new();

        for name in &self.enabled {
            let Some(spec) = generators::lookup(name) else {
                warn!(collector = %name, "Unknown collector, skipping");
                continue;
            };

            let mut stores = Vec::new();
            for namespace in self.watch_scopes(spec) {
                let store = Arc::new(MetricsStore::new());
                let mut watcher = ResourceWatcher::new(
                    spec,
                    namespace,
                    Arc::clone(&api),
                    Arc::clone(&store),
                    self.watcher_config.clone(),
                );
                if let Some(telemetry) = &self.telemetry {
                    watcher = watcher.with_telemetry(telemetry.clone());
                }
                handles.push(tokio::spawn(watcher.run(self.shutdown.clone())));
                stores.push(store);
            }

            collectors.push(Collector::new(spec, stores));
        }

        let active: Vec<&str> = collectors.iter().map(Collector::name).collect();
        info!("Active collectors: {}", active.join(","));

        Ok(BuiltCollectors {
            collectors,
            handles,
            shutdown: self.shutdown,
        })
    }

    /// Namespace filter of each watcher for `spec`; `None` watches all namespaces
    fn watch_scopes(&self, spec: &KindSpec) -> Vec<Option<String>> {
        if !spec.resource.namespaced || self.namespaces.is_empty() {
            vec![None]
        } else {
            self.namespaces.iter().cloned().map(Some).collect()
        }
    }
}

/// Result of [`Builder::build`]
#[derive(Debug)]
pub struct BuiltCollectors {
    /// One collector per active kind, sorted by kind name
    pub collectors: Vec<Collector>,
    /// Spawned watcher tasks
    pub handles: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl BuiltCollectors {
    /// Token that stops every watcher
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Cancel every watcher and wait for them to finish
    ///
    /// Returns the collectors, which keep serving their last state.
    pub async fn shutdown(self) -> Vec<Collector> {
        self.shutdown.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Watcher task failed");
            }
        }
        self.collectors
    }
}
