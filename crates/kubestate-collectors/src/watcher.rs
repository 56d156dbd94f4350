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

//! Resource watcher
//!
//! Keeps one [`MetricsStore`] in sync with one (kind, namespace) pair of the
//! remote API. The watcher is a small state machine:
//!
//! ```text
//!                 list ok
//!  Initializing ───────────▶ Streaming{rv}
//!     ▲   │ list failed          │  events: upsert / delete, rv advances
//!     │   └──(backoff)──┐        │
//!     │                 ▼        │ stale cursor, stream error, resync timer
//!     └──────────────────────────┘
//!
//!  any state ── cancelled ──▶ Stopped
//! ```
//!
//! Events are applied in the order the stream delivers them. A full relist
//! always commits through [`MetricsStore::replace`], so readers never see a mix
//! of two listings.
//!
//! Failed lists and failed streams retry with exponential backoff. Watch
//! cycles that end without delivering a single event are retried at once the
//! first time and with backoff after that, so a server that keeps dropping
//! watches or answering with a stale cursor is not hammered.

use crate::api::{RawObject, ResourceApi, WatchEvent, WatchStream};
use crate::error::{ApiError, GeneratorError};
use crate::generators::{self, KindSpec};
use futures::StreamExt;
use kubestate_metrics::{Metric, TelemetryRegistry};
use kubestate_store::{MetricsStore, ObjectIdentity};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Timing configuration of a watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherConfig {
    /// Interval after which a full relist is forced
    pub resync_period: Duration,
    /// First retry delay after a failed list
    pub backoff_base: Duration,
    /// Upper bound of the retry delay
    pub backoff_max: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            resync_period: Duration::from_secs(300),
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(30),
        }
    }
}

impl WatcherConfig {
    /// Delay before retry number `attempt` (0-based)
    ///
    /// Exponential: `backoff_base * 2^attempt`, capped at `backoff_max`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt.min(16));
        self.backoff_base
            .saturating_mul(multiplier)
            .min(self.backoff_max)
    }
}

/// Lifecycle state of a watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherState {
    /// Waiting for (or retrying) a full list
    Initializing,
    /// Consuming the change stream from `resource_version`
    Streaming {
        /// Last observed cursor
        resource_version: String,
    },
    /// Cancelled; no further store mutations
    Stopped,
}

/// Why a watcher went back to a full list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelistReason {
    /// The cursor is no longer retained by the server
    StaleCursor,
    /// The change stream failed
    StreamError,
    /// The periodic resync timer fired
    Resync,
}

impl RelistReason {
    /// Get string label for telemetry
    pub fn as_label(&self) -> &'static str {
        match self {
            RelistReason::StaleCursor => "stale_cursor",
            RelistReason::StreamError => "stream_error",
            RelistReason::Resync => "resync",
        }
    }
}

enum Wakeup<T> {
    Cancelled,
    Resync,
    Ready(T),
}

/// Mirrors one (kind, namespace) pair into a store
pub struct ResourceWatcher {
    spec: &'static KindSpec,
    namespace: Option<String>,
    api: Arc<dyn ResourceApi>,
    store: Arc<MetricsStore>,
    config: WatcherConfig,
    telemetry: Option<TelemetryRegistry>,
    state: WatcherState,
    failures: u32,
    quiet_cycles: u32,
    pending_delay: Option<Duration>,
    stream: Option<WatchStream>,
    resync_at: Instant,
}

impl ResourceWatcher {
    /// Create a watcher in the `Initializing` state
    ///
    /// `namespace` is ignored for cluster-scoped kinds.
    pub fn new(
        spec: &'static KindSpec,
        namespace: Option<String>,
        api: Arc<dyn ResourceApi>,
        store: Arc<MetricsStore>,
        config: WatcherConfig,
    ) -> Self {
        let namespace = namespace.filter(|_| spec.resource.namespaced);
        Self {
            spec,
            namespace,
            api,
            store,
            config,
            telemetry: None,
            state: WatcherState::Initializing,
            failures: 0,
            quiet_cycles: 0,
            pending_delay: None,
            stream: None,
            resync_at: Instant::now(),
        }
    }

    /// Report lists, events and relists to `telemetry`
    pub fn with_telemetry(mut self, telemetry: TelemetryRegistry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Current state
    pub fn state(&self) -> &WatcherState {
        &self.state
    }

    /// Store this watcher writes to
    pub fn store(&self) -> &Arc<MetricsStore> {
        &self.store
    }

    /// Namespace filter, `None` for a cluster-wide watcher
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Consecutive failed attempts since the last successful list
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Watch cycles in a row that ended without delivering an event
    pub fn quiet_cycles(&self) -> u32 {
        self.quiet_cycles
    }

    /// Drive the watcher until `cancel` fires
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            resource = self.spec.name,
            namespace = self.namespace_label(),
            "Starting watcher"
        );
        while self.step(&cancel).await != &WatcherState::Stopped {}
        info!(
            resource = self.spec.name,
            namespace = self.namespace_label(),
            "Watcher stopped"
        );
    }

    /// Perform one transition and return the resulting state
    ///
    /// A transition is one list attempt, one watch open, or one stream item.
    pub async fn step(&mut self, cancel: &CancellationToken) -> &WatcherState {
        if cancel.is_cancelled() {
            self.stop();
            return &self.state;
        }

        match &self.state {
            WatcherState::Stopped => {}
            WatcherState::Initializing => self.initialize(cancel).await,
            WatcherState::Streaming { resource_version } => {
                let resource_version = resource_version.clone();
                if self.stream.is_some() {
                    self.consume(cancel).await;
                } else {
                    self.open(cancel, &resource_version).await;
                }
            }
        }

        &self.state
    }

    /// Wait out the delay owed by the previous attempt; false when cancelled
    async fn pause(&mut self, cancel: &CancellationToken) -> bool {
        let Some(delay) = self.pending_delay.take() else {
            return true;
        };
        debug!(
            resource = self.spec.name,
            namespace = self.namespace_label(),
            delay_ms = delay.as_millis() as u64,
            "Backing off"
        );
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = time::sleep(delay) => true,
        }
    }

    async fn initialize(&mut self, cancel: &CancellationToken) {
        if !self.pause(cancel).await {
            return self.stop();
        }

        let listed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return self.stop(),
            listed = self.api.list(&self.spec.resource, self.namespace.as_deref()) => listed,
        };

        let list = match listed {
            Ok(list) => list,
            Err(e) => {
                self.failures = self.failures.saturating_add(1);
                self.pending_delay = Some(self.config.backoff_delay(self.failures - 1));
                self.record_list(false);
                warn!(
                    resource = self.spec.name,
                    namespace = self.namespace_label(),
                    attempt = self.failures,
                    error = %e,
                    "List failed"
                );
                return;
            }
        };

        let entries = self.render_listing(&list.items).await;
        let objects = entries.len();
        self.store.replace(entries).await;

        self.failures = 0;
        self.record_list(true);
        self.record_store_size().await;
        self.resync_at = Instant::now() + self.config.resync_period;
        self.state = WatcherState::Streaming {
            resource_version: list.resource_version,
        };
        info!(
            resource = self.spec.name,
            namespace = self.namespace_label(),
            objects = objects,
            "Listed objects"
        );
    }

    async fn open(&mut self, cancel: &CancellationToken, resource_version: &str) {
        if !self.pause(cancel).await {
            return self.stop();
        }

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => Wakeup::Cancelled,
            _ = time::sleep_until(self.resync_at) => Wakeup::Resync,
            opened = self.api.watch(&self.spec.resource, self.namespace.as_deref(), resource_version) => {
                Wakeup::Ready(opened)
            }
        };

        match opened {
            Wakeup::Cancelled => self.stop(),
            Wakeup::Resync => self.relist(RelistReason::Resync),
            Wakeup::Ready(Ok(stream)) => {
                debug!(
                    resource = self.spec.name,
                    namespace = self.namespace_label(),
                    resource_version = resource_version,
                    "Watch opened"
                );
                self.stream = Some(stream);
            }
            Wakeup::Ready(Err(e)) => self.stream_failed(&e),
        }
    }

    async fn consume(&mut self, cancel: &CancellationToken) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };

        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => Wakeup::Cancelled,
            _ = time::sleep_until(self.resync_at) => Wakeup::Resync,
            item = stream.next() => Wakeup::Ready(item),
        };

        match item {
            Wakeup::Cancelled => self.stop(),
            Wakeup::Resync => self.relist(RelistReason::Resync),
            Wakeup::Ready(Some(Ok(event))) => self.apply(event).await,
            Wakeup::Ready(Some(Err(e))) => self.stream_failed(&e),
            Wakeup::Ready(None) => {
                // Resume from the current cursor on the next step
                debug!(
                    resource = self.spec.name,
                    namespace = self.namespace_label(),
                    "Watch stream closed"
                );
                self.stream = None;
                self.quiet_cycle();
            }
        }
    }

    async fn apply(&mut self, event: WatchEvent) {
        self.quiet_cycles = 0;
        if let Some(telemetry) = &self.telemetry {
            telemetry.record_event(self.spec.name, self.namespace_label(), event.as_label());
        }

        let resource_version = event.resource_version().map(str::to_string);
        match &event {
            WatchEvent::Added(object) | WatchEvent::Modified(object) => {
                self.upsert(object).await;
                self.record_store_size().await;
            }
            WatchEvent::Deleted(tombstone) => {
                self.store.delete(&tombstone.identity).await;
                self.record_store_size().await;
            }
            WatchEvent::Bookmark(_) => {}
        }

        if let (Some(rv), WatcherState::Streaming { resource_version }) =
            (resource_version, &mut self.state)
        {
            *resource_version = rv;
        }
    }

    async fn upsert(&mut self, object: &RawObject) {
        let Some(identity) = object.identity(self.spec.resource.kind) else {
            warn!(
                resource = self.spec.name,
                namespace = self.namespace_label(),
                "Ignoring object without a name"
            );
            return;
        };

        match generators::render(self.spec, object) {
            Ok(records) => self.store.upsert(identity, records).await,
            // Keep whatever the previous rendering was
            Err(e) => self.generator_failed(&identity, &e),
        }
    }

    async fn render_listing(&mut self, items: &[RawObject]) -> Vec<(ObjectIdentity, Vec<Metric>)> {
        let mut entries = Vec::with_capacity(items.len());
        for object in items {
            let Some(identity) = object.identity(self.spec.resource.kind) else {
                warn!(
                    resource = self.spec.name,
                    namespace = self.namespace_label(),
                    "Ignoring listed object without a name"
                );
                continue;
            };

            match generators::render(self.spec, object) {
                Ok(records) => entries.push((identity, records)),
                Err(e) => {
                    self.generator_failed(&identity, &e);
                    if let Some(previous) = self.store.get(&identity).await {
                        entries.push((identity, previous.to_vec()));
                    }
                }
            }
        }
        entries
    }

    fn stream_failed(&mut self, error: &ApiError) {
        self.quiet_cycle();
        if error.is_stale_cursor() {
            self.relist(RelistReason::StaleCursor);
        } else {
            warn!(
                resource = self.spec.name,
                namespace = self.namespace_label(),
                error = %error,
                "Watch failed"
            );
            self.failures = self.failures.saturating_add(1);
            let delay = self.config.backoff_delay(self.failures - 1);
            self.pending_delay = Some(self.pending_delay.map_or(delay, |owed| owed.max(delay)));
            self.relist(RelistReason::StreamError);
        }
    }

    /// Count a watch cycle that ended without events
    ///
    /// The first one in a row retries at once.
    fn quiet_cycle(&mut self) {
        self.quiet_cycles = self.quiet_cycles.saturating_add(1);
        if let Some(attempt) = self.quiet_cycles.checked_sub(2) {
            self.pending_delay = Some(self.config.backoff_delay(attempt));
        }
    }

    fn relist(&mut self, reason: RelistReason) {
        info!(
            resource = self.spec.name,
            namespace = self.namespace_label(),
            reason = reason.as_label(),
            "Relisting"
        );
        if let Some(telemetry) = &self.telemetry {
            telemetry.record_relist(self.spec.name, self.namespace_label(), reason.as_label());
        }
        self.stream = None;
        self.state = WatcherState::Initializing;
    }

    fn stop(&mut self) {
        self.stream = None;
        self.state = WatcherState::Stopped;
    }

    fn generator_failed(&self, identity: &ObjectIdentity, error: &GeneratorError) {
        warn!(
            resource = self.spec.name,
            object = %identity,
            error = %error,
            "Failed to generate metrics"
        );
        if let Some(telemetry) = &self.telemetry {
            telemetry.record_generator_error(self.spec.name);
        }
    }

    fn record_list(&self, success: bool) {
        if let Some(telemetry) = &self.telemetry {
            telemetry.record_list(self.spec.name, self.namespace_label(), success);
        }
    }

    async fn record_store_size(&mut self) {
        if let Some(telemetry) = &self.telemetry {
            telemetry.set_store_objects(
                self.spec.name,
                self.namespace_label(),
                self.store.len().await,
            );
        }
    }

    fn namespace_label(&self) -> &str {
        self.namespace.as_deref().unwrap_or("")
    }
}

impl std::fmt::Debug for ResourceWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceWatcher")
            .field("resource", &self.spec.name)
            .field("namespace", &self.namespace)
            .field("state", &self.state)
            .field("failures", &self.failures)
            .field("quiet_cycles", &self.quiet_cycles)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::{MockApi, ObjectList, ResourceType, Tombstone};
    use crate::error::ApiResult;
    use async_trait::async_trait;
    use futures::stream;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CONFIGMAPS: ResourceType = ResourceType::core("v1", "ConfigMap", "configmaps", true);
    const DEPLOYMENTS: ResourceType =
        ResourceType::grouped("apps", "v1", "Deployment", "deployments", true);

    fn config() -> WatcherConfig {
        WatcherConfig {
            resync_period: Duration::from_secs(60),
            backoff_base: Duration::from_millis(100),
            backoff_max: Duration::from_secs(1),
        }
    }

    fn watcher(api: &MockApi, kind: &str, namespace: Option<&str>) -> ResourceWatcher {
        ResourceWatcher::new(
            generators::lookup(kind).unwrap(),
            namespace.map(str::to_string),
            Arc::new(api.clone()),
            Arc::new(MetricsStore::new()),
            config(),
        )
    }

    fn configmap(ns: &str, name: &str) -> Value {
        json!({"metadata": {"name": name, "namespace": ns}})
    }

    fn id(ns: &str, name: &str) -> ObjectIdentity {
        ObjectIdentity::namespaced("ConfigMap", ns, name)
    }

    async fn names(store: &MetricsStore) -> Vec<String> {
        store
            .identities()
            .await
            .into_iter()
            .map(|id| id.name().to_string())
            .collect()
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let config = config();
        assert_eq!(config.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(config.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(config.backoff_delay(3), Duration::from_millis(800));
        assert_eq!(config.backoff_delay(4), Duration::from_secs(1));
        assert_eq!(config.backoff_delay(u32::MAX), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_list_fills_store() {
        let api = MockApi::new();
        api.apply(&CONFIGMAPS, configmap("default", "a")).await;
        api.apply(&CONFIGMAPS, configmap("default", "b")).await;
        api.apply(&CONFIGMAPS, configmap("other", "c")).await;

        let cancel = CancellationToken::new();
        let mut w = watcher(&api, "configmaps", Some("default"));
        assert_eq!(w.state(), &WatcherState::Initializing);

        let state = w.step(&cancel).await.clone();
        assert_eq!(
            state,
            WatcherState::Streaming {
                resource_version: "3".into()
            }
        );
        assert_eq!(names(w.store()).await, vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_applied_in_order() {
        let api = MockApi::new();
        let cancel = CancellationToken::new();
        let mut w = watcher(&api, "configmaps", None);

        w.step(&cancel).await; // list
        w.step(&cancel).await; // open watch

        api.apply(&CONFIGMAPS, configmap("ns", "x")).await;
        api.apply(&CONFIGMAPS, configmap("ns", "x")).await;
        api.delete(&CONFIGMAPS, Some("ns"), "x").await;
        api.apply(&CONFIGMAPS, configmap("ns", "y")).await;

        for _ in 0..4 {
            w.step(&cancel).await;
        }

        assert_eq!(names(w.store()).await, vec!["y"]);
        assert_eq!(
            w.state(),
            &WatcherState::Streaming {
                resource_version: "4".into()
            }
        );
        assert_eq!(api.list_calls().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_cursor_forces_relist() {
        let api = MockApi::new();
        api.apply(&CONFIGMAPS, configmap("ns", "old")).await;

        let cancel = CancellationToken::new();
        let mut w = watcher(&api, "configmaps", None);
        w.step(&cancel).await;

        // Changes happen and history is compacted before the watch opens
        api.delete(&CONFIGMAPS, Some("ns"), "old").await;
        api.apply(&CONFIGMAPS, configmap("ns", "new")).await;
        api.compact().await;

        assert_eq!(w.step(&cancel).await, &WatcherState::Initializing);
        assert_eq!(w.failures(), 0);

        w.step(&cancel).await;
        assert_eq!(names(w.store()).await, vec!["new"]);
        assert_eq!(api.list_calls().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_stream_relists() {
        let api = MockApi::new();
        let cancel = CancellationToken::new();
        let mut w = watcher(&api, "configmaps", None);
        w.step(&cancel).await;
        w.step(&cancel).await;

        api.apply(&CONFIGMAPS, configmap("ns", "a")).await;
        w.step(&cancel).await;
        assert_eq!(names(w.store()).await, vec!["a"]);

        api.expire_watches().await;
        assert_eq!(w.step(&cancel).await, &WatcherState::Initializing);

        w.step(&cancel).await;
        assert!(matches!(w.state(), WatcherState::Streaming { .. }));
        assert_eq!(names(w.store()).await, vec!["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resync_drops_phantom_entries() {
        let api = MockApi::new();
        api.apply(&CONFIGMAPS, configmap("ns", "real")).await;

        let cancel = CancellationToken::new();
        let mut w = watcher(&api, "configmaps", None);
        w.step(&cancel).await;
        w.step(&cancel).await;

        // An event for an object the server never had
        api.inject(
            &CONFIGMAPS,
            Some("ns"),
            WatchEvent::Added(RawObject::new(json!({
                "metadata": {"name": "phantom", "namespace": "ns", "resourceVersion": "1"}
            }))),
        );
        w.step(&cancel).await;
        assert_eq!(names(w.store()).await, vec!["phantom", "real"]);

        // Nothing else arrives; the resync timer fires
        let started = Instant::now();
        assert_eq!(w.step(&cancel).await, &WatcherState::Initializing);
        assert!(started.elapsed() >= Duration::from_secs(60));

        w.step(&cancel).await;
        assert_eq!(names(w.store()).await, vec!["real"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missed_delete_repaired_by_relist() {
        let api = MockApi::new();
        api.apply(&CONFIGMAPS, configmap("ns", "a")).await;

        let cancel = CancellationToken::new();
        let mut w = watcher(&api, "configmaps", None);
        w.step(&cancel).await;
        assert!(w.store().get(&id("ns", "a")).await.is_some());

        // The delete happens while no stream is open and history is lost
        api.delete(&CONFIGMAPS, Some("ns"), "a").await;
        api.compact().await;

        w.step(&cancel).await;
        w.step(&cancel).await;
        assert!(w.store().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_failure_backs_off() {
        let api = MockApi::new();
        api.apply(&CONFIGMAPS, configmap("ns", "a")).await;
        api.fail_next_lists(2).await;

        let cancel = CancellationToken::new();
        let mut w = watcher(&api, "configmaps", None);
        let started = Instant::now();

        assert_eq!(w.step(&cancel).await, &WatcherState::Initializing);
        assert_eq!(w.failures(), 1);
        assert_eq!(w.step(&cancel).await, &WatcherState::Initializing);
        assert_eq!(w.failures(), 2);
        assert!(w.store().is_empty().await);

        w.step(&cancel).await;
        assert!(matches!(w.state(), WatcherState::Streaming { .. }));
        assert_eq!(w.failures(), 0);
        assert_eq!(names(w.store()).await, vec!["a"]);

        // 100ms before the second attempt, 200ms before the third
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_close_resumes_without_relist() {
        let api = MockApi::new();
        let cancel = CancellationToken::new();
        let mut w = watcher(&api, "configmaps", None);
        w.step(&cancel).await;
        w.step(&cancel).await;

        api.close_watches();
        w.step(&cancel).await;
        api.apply(&CONFIGMAPS, configmap("ns", "late")).await;

        w.step(&cancel).await; // reopen from cursor, backlog replayed
        w.step(&cancel).await;

        assert_eq!(names(w.store()).await, vec!["late"]);
        assert_eq!(api.list_calls().await, 1);
        assert_eq!(api.watch_calls().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bookmark_only_moves_cursor() {
        let api = MockApi::new();
        api.apply(&CONFIGMAPS, configmap("ns", "a")).await;
        let cancel = CancellationToken::new();
        let mut w = watcher(&api, "configmaps", None);
        w.step(&cancel).await;
        w.step(&cancel).await;

        let rv = api.bookmark(&CONFIGMAPS).await;
        w.step(&cancel).await;

        assert_eq!(
            w.state(),
            &WatcherState::Streaming {
                resource_version: rv
            }
        );
        assert_eq!(names(w.store()).await, vec!["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generator_failure_keeps_previous_entry() {
        let api = MockApi::new();
        let telemetry = TelemetryRegistry::new().unwrap();
        api.apply(
            &DEPLOYMENTS,
            json!({"metadata": {"name": "web", "namespace": "prod"}, "spec": {"replicas": 2}}),
        )
        .await;

        let cancel = CancellationToken::new();
        let mut w = watcher(&api, "deployments", None).with_telemetry(telemetry.clone());
        w.step(&cancel).await;
        w.step(&cancel).await;

        api.apply(
            &DEPLOYMENTS,
            json!({"metadata": {"name": "web", "namespace": "prod"}, "spec": {"replicas": "many"}}),
        )
        .await;
        w.step(&cancel).await;

        let identity = ObjectIdentity::namespaced("Deployment", "prod", "web");
        let records = w.store().get(&identity).await.unwrap();
        let replicas = records
            .iter()
            .find(|r| r.name() == "kube_deployment_spec_replicas")
            .unwrap();
        assert_eq!(replicas.value(), 2.0);

        let text = String::from_utf8(telemetry.encode_text().unwrap()).unwrap();
        assert!(text.contains("kubestate_generator_errors_total{resource=\"deployments\"} 1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_by_tombstone() {
        let api = MockApi::new();
        api.apply(&CONFIGMAPS, configmap("ns", "a")).await;
        let cancel = CancellationToken::new();
        let mut w = watcher(&api, "configmaps", None);
        w.step(&cancel).await;
        w.step(&cancel).await;

        api.inject(
            &CONFIGMAPS,
            Some("ns"),
            WatchEvent::Deleted(Tombstone {
                identity: id("ns", "a"),
                resource_version: None,
            }),
        );
        w.step(&cancel).await;
        assert!(w.store().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_watcher_stops_mutating() {
        let api = MockApi::new();
        let cancel = CancellationToken::new();
        let mut w = watcher(&api, "configmaps", None);
        w.step(&cancel).await;
        w.step(&cancel).await;

        api.apply(&CONFIGMAPS, configmap("ns", "after")).await;
        cancel.cancel();

        assert_eq!(w.step(&cancel).await, &WatcherState::Stopped);
        assert_eq!(w.step(&cancel).await, &WatcherState::Stopped);
        assert!(w.store().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_exits_on_cancel() {
        let api = MockApi::new();
        let cancel = CancellationToken::new();
        let w = watcher(&api, "configmaps", None);
        let store = Arc::clone(w.store());

        let handle = tokio::spawn(w.run(cancel.clone()));
        api.apply(&CONFIGMAPS, configmap("ns", "a")).await;
        tokio::task::yield_now().await;

        cancel.cancel();
        time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        let before = store.len().await;
        api.apply(&CONFIGMAPS, configmap("ns", "b")).await;
        tokio::task::yield_now().await;
        assert_eq!(store.len().await, before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cluster_scoped_ignores_namespace() {
        let api = MockApi::new();
        let w = watcher(&api, "nodes", Some("default"));
        assert_eq!(w.namespace(), None);
    }

    /// Watch endpoint that drops every stream before it yields anything
    #[derive(Debug)]
    struct DroppingApi {
        stale: bool,
        lists: AtomicUsize,
        watches: AtomicUsize,
    }

    impl DroppingApi {
        fn new(stale: bool) -> Arc<Self> {
            Arc::new(Self {
                stale,
                lists: AtomicUsize::new(0),
                watches: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ResourceApi for DroppingApi {
        async fn list(
            &self,
            _resource: &ResourceType,
            _namespace: Option<&str>,
        ) -> ApiResult<ObjectList> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            Ok(ObjectList {
                items: Vec::new(),
                resource_version: "1".to_string(),
            })
        }

        async fn watch(
            &self,
            _resource: &ResourceType,
            _namespace: Option<&str>,
            _resource_version: &str,
        ) -> ApiResult<WatchStream> {
            self.watches.fetch_add(1, Ordering::SeqCst);
            if self.stale {
                Err(ApiError::Gone("too old resource version".to_string()))
            } else {
                Ok(stream::empty().boxed())
            }
        }
    }

    fn dropping_watcher(api: &Arc<DroppingApi>) -> ResourceWatcher {
        let api: Arc<dyn ResourceApi> = Arc::clone(api) as Arc<dyn ResourceApi>;
        ResourceWatcher::new(
            generators::lookup("configmaps").unwrap(),
            None,
            api,
            Arc::new(MetricsStore::new()),
            config(),
        )
    }

    #[test]
    fn test_run_future_is_send() {
        fn assert_send<T: Send>(_: T) {}

        let api = MockApi::new();
        let w = watcher(&api, "configmaps", None);
        assert_send(w.run(CancellationToken::new()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_streams_reopen_with_backoff() {
        let api = DroppingApi::new(false);
        let cancel = CancellationToken::new();
        let mut w = dropping_watcher(&api);
        let started = Instant::now();

        while api.watches.load(Ordering::SeqCst) < 10 {
            w.step(&cancel).await;
        }

        // Two immediate opens, then 100, 200, 400, 800 and 1000ms capped
        assert!(started.elapsed() >= Duration::from_millis(100 + 200 + 400 + 800 + 4 * 1000));
        assert!(started.elapsed() < Duration::from_secs(60));
        assert_eq!(api.lists.load(Ordering::SeqCst), 1);
        assert!(w.quiet_cycles() >= 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_stale_cursor_backs_off() {
        let api = DroppingApi::new(true);
        let cancel = CancellationToken::new();
        let mut w = dropping_watcher(&api);
        let started = Instant::now();

        while api.lists.load(Ordering::SeqCst) < 6 {
            w.step(&cancel).await;
        }

        // The first relist is immediate, the following ones wait
        assert!(started.elapsed() >= Duration::from_millis(100 + 200 + 400 + 800));
        assert_eq!(w.failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_resets_quiet_cycles() {
        let api = MockApi::new();
        let cancel = CancellationToken::new();
        let mut w = watcher(&api, "configmaps", None);
        w.step(&cancel).await;
        w.step(&cancel).await;

        for _ in 0..3 {
            api.close_watches();
            w.step(&cancel).await; // stream ends
            w.step(&cancel).await; // reopen
        }
        assert_eq!(w.quiet_cycles(), 3);

        api.apply(&CONFIGMAPS, configmap("ns", "a")).await;
        w.step(&cancel).await;
        assert_eq!(w.quiet_cycles(), 0);
        assert_eq!(names(w.store()).await, vec!["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_interrupted_by_cancel() {
        let api = DroppingApi::new(false);
        let cancel = CancellationToken::new();
        let mut w = dropping_watcher(&api);

        while w.quiet_cycles() < 5 {
            w.step(&cancel).await;
        }

        let cancelled = cancel.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(10)).await;
            cancelled.cancel();
        });
        assert_eq!(w.step(&cancel).await, &WatcherState::Stopped);
    }
}
