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

//! Self-telemetry registry
//!
//! Tracks the health of the synchronization pipeline itself (lists, watch
//! events, relists, generator failures, store sizes, scrape latency). Served
//! separately from the object feed.

use prometheus::{
    Encoder, GaugeVec, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Telemetry registry shared by every watcher and the feed server
///
/// Thread-safe registry that can be cloned and shared across async tasks.
#[derive(Clone)]
pub struct TelemetryRegistry {
    inner: Arc<TelemetryRegistryInner>,
}

struct TelemetryRegistryInner {
    /// Prometheus registry
    registry: Registry,

    // Watcher metrics
    /// List calls by result
    watcher_lists: IntCounterVec,
    /// Change-stream events by kind
    watcher_events: IntCounterVec,
    /// Forced relists by reason
    watcher_relists: IntCounterVec,

    // Generator metrics
    /// Objects whose rendering failed
    generator_errors: IntCounterVec,

    // Store metrics
    /// Objects currently held per store
    store_objects: GaugeVec,

    // Feed metrics
    /// Scrape rendering duration (seconds)
    scrape_duration: Histogram,
}

impl TelemetryRegistry {
    /// Create new telemetry registry
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let watcher_lists = IntCounterVec::new(
            Opts::new(
                "kubestate_watcher_lists_total",
                "Full list calls issued by resource watchers",
            ),
            &["resource", "namespace", "result"],
        )?;
        registry.register(Box::new(watcher_lists.clone()))?;

        let watcher_events = IntCounterVec::new(
            Opts::new(
                "kubestate_watcher_events_total",
                "Change-stream events applied by resource watchers",
            ),
            &["resource", "namespace", "event"],
        )?;
        registry.register(Box::new(watcher_events.clone()))?;

        let watcher_relists = IntCounterVec::new(
            Opts::new(
                "kubestate_watcher_relists_total",
                "Transitions back to a full relist",
            ),
            &["resource", "namespace", "reason"],
        )?;
        registry.register(Box::new(watcher_relists.clone()))?;

        let generator_errors = IntCounterVec::new(
            Opts::new(
                "kubestate_generator_errors_total",
                "Objects skipped because their metrics could not be generated",
            ),
            &["resource"],
        )?;
        registry.register(Box::new(generator_errors.clone()))?;

        let store_objects = GaugeVec::new(
            Opts::new(
                "kubestate_store_objects",
                "Objects currently held in a metrics store",
            ),
            &["resource", "namespace"],
        )?;
        registry.register(Box::new(store_objects.clone()))?;

        let scrape_duration = Histogram::with_opts(
            HistogramOpts::new(
                "kubestate_scrape_duration_seconds",
                "Time spent rendering the metrics feed",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
        )?;
        registry.register(Box::new(scrape_duration.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        tracing::debug!("Telemetry registry initialized");

        Ok(Self {
            inner: Arc::new(TelemetryRegistryInner {
                registry,
                watcher_lists,
                watcher_events,
                watcher_relists,
                generator_errors,
                store_objects,
                scrape_duration,
            }),
        })
    }

    /// Get reference to Prometheus registry for gathering metrics
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    // Watcher metrics

    /// Record the outcome of a full list call
    pub fn record_list(&self, resource: &str, namespace: &str, success: bool) {
        let result = if success { "success" } else { "error" };
        self.inner
            .watcher_lists
            .with_label_values(&[resource, namespace, result])
            .inc();
    }

    /// Record one applied change-stream event
    pub fn record_event(&self, resource: &str, namespace: &str, event: &str) {
        self.inner
            .watcher_events
            .with_label_values(&[resource, namespace, event])
            .inc();
    }

    /// Record a transition back to relisting
    pub fn record_relist(&self, resource: &str, namespace: &str, reason: &str) {
        self.inner
            .watcher_relists
            .with_label_values(&[resource, namespace, reason])
            .inc();
    }

    /// Record a failed object rendering
    pub fn record_generator_error(&self, resource: &str) {
        self.inner
            .generator_errors
            .with_label_values(&[resource])
            .inc();
    }

    // Store metrics

    /// Set the current object count of a store
    pub fn set_store_objects(&self, resource: &str, namespace: &str, objects: usize) {
        self.inner
            .store_objects
            .with_label_values(&[resource, namespace])
            .set(objects as f64);
    }

    // Feed metrics

    /// Record how long one scrape took to render
    pub fn observe_scrape(&self, duration_secs: f64) {
        self.inner.scrape_duration.observe(duration_secs);
    }

    /// Encode every telemetry metric in the text exposition format
    pub fn encode_text(&self) -> anyhow::Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.inner.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}

impl std::fmt::Debug for TelemetryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = TelemetryRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_watcher_metrics() {
        let registry = TelemetryRegistry::new().unwrap();

        registry.record_list("configmaps", "default", true);
        registry.record_list("configmaps", "default", false);
        registry.record_list("configmaps", "default", false);
        registry.record_event("configmaps", "default", "added");
        registry.record_relist("configmaps", "default", "stale_cursor");

        let errors = registry
            .inner
            .watcher_lists
            .with_label_values(&["configmaps", "default", "error"])
            .get();
        assert_eq!(errors, 2);

        let relists = registry
            .inner
            .watcher_relists
            .with_label_values(&["configmaps", "default", "stale_cursor"])
            .get();
        assert_eq!(relists, 1);
    }

    #[test]
    fn test_store_gauge_overwrites() {
        let registry = TelemetryRegistry::new().unwrap();

        registry.set_store_objects("pods", "kube-system", 10);
        registry.set_store_objects("pods", "kube-system", 4);

        let objects = registry
            .inner
            .store_objects
            .with_label_values(&["pods", "kube-system"])
            .get();
        assert_eq!(objects, 4.0);
    }

    #[test]
    fn test_encode_text() {
        let registry = TelemetryRegistry::new().unwrap();
        registry.record_generator_error("secrets");
        registry.observe_scrape(0.02);

        let text = String::from_utf8(registry.encode_text().unwrap()).unwrap();
        assert!(text.contains("kubestate_generator_errors_total{resource=\"secrets\"} 1"));
        assert!(text.contains("kubestate_scrape_duration_seconds_count 1"));
    }
}
