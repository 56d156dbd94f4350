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

//! In-memory mock API for testing
//!
//! Provides a small simulated cluster implementing [`ResourceApi`]: objects
//! can be applied and deleted, every change gets a monotonically increasing
//! resource version, and open watches receive the changes in order.
//!
//! The mock also lets tests force the failure modes a watcher must survive:
//! compacted history (stale cursors), watches expiring mid-stream, streams
//! closing cleanly and failing list calls.
//!
//! # Examples
//!
//! ```rust,no_run
//! use kubestate_collectors::api::{MockApi, ResourceApi};
//! use kubestate_collectors::generators;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let api = MockApi::new();
//!     let configmaps = generators::lookup("configmaps").unwrap().resource;
//!
//!     api.apply(&configmaps, json!({"metadata": {"name": "a", "namespace": "default"}}))
//!         .await;
//!
//!     let list = api.list(&configmaps, Some("default")).await?;
//!     assert_eq!(list.items.len(), 1);
//!     Ok(())
//! }
//! ```

use super::{ObjectList, RawObject, ResourceApi, ResourceType, Tombstone, WatchEvent, WatchStream};
use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use kubestate_store::ObjectIdentity;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

const SIGNAL_CAPACITY: usize = 1024;
const HISTORY_LIMIT: usize = 4096;

#[derive(Debug, Clone)]
enum Signal {
    Event {
        plural: &'static str,
        namespace: Option<String>,
        event: WatchEvent,
    },
    Close,
    Expire,
}

#[derive(Debug, Clone)]
struct HistoryEntry {
    version: u64,
    plural: &'static str,
    namespace: Option<String>,
    event: WatchEvent,
}

#[derive(Debug, Default)]
struct MockCluster {
    version: u64,
    compacted_at: u64,
    objects: BTreeMap<&'static str, BTreeMap<ObjectIdentity, RawObject>>,
    history: VecDeque<HistoryEntry>,
    failing_lists: usize,
    list_calls: usize,
    watch_calls: usize,
}

impl MockCluster {
    fn next_version(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    fn record(&mut self, entry: HistoryEntry) {
        if self.history.len() == HISTORY_LIMIT {
            if let Some(oldest) = self.history.pop_front() {
                self.compacted_at = oldest.version;
            }
        }
        self.history.push_back(entry);
    }
}

/// In-memory mock cluster for testing
///
/// Cheap to clone; clones share the same simulated cluster.
#[derive(Clone)]
pub struct MockApi {
    cluster: Arc<RwLock<MockCluster>>,
    signals: broadcast::Sender<Signal>,
}

impl MockApi {
    /// Create an empty mock cluster
    pub fn new() -> Self {
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self {
            cluster: Arc::new(RwLock::new(MockCluster::default())),
            signals,
        }
    }

    /// Create or update an object, returning its new resource version
    ///
    /// `metadata.resourceVersion` is overwritten with the assigned version.
    pub async fn apply(&self, resource: &ResourceType, mut object: Value) -> String {
        let mut cluster = self.cluster.write().await;
        let version = cluster.next_version();

        if let Some(metadata) = object
            .as_object_mut()
            .and_then(|obj| obj.get_mut("metadata"))
            .and_then(Value::as_object_mut)
        {
            metadata.insert(
                "resourceVersion".to_string(),
                Value::String(version.to_string()),
            );
        }
        let object = RawObject::new(object);

        let Some(identity) = object.identity(resource.kind) else {
            return version.to_string();
        };
        let namespace = identity.namespace().map(str::to_string);

        let previous = cluster
            .objects
            .entry(resource.plural)
            .or_default()
            .insert(identity, object.clone());

        let event = if previous.is_some() {
            WatchEvent::Modified(object)
        } else {
            WatchEvent::Added(object)
        };

        self.publish(&mut cluster, version, resource.plural, namespace, event);
        version.to_string()
    }

    /// Delete an object; returns whether it existed
    pub async fn delete(&self, resource: &ResourceType, namespace: Option<&str>, name: &str) -> bool {
        let mut cluster = self.cluster.write().await;
        let identity = ObjectIdentity::new(resource.kind, namespace, name);

        let removed = cluster
            .objects
            .get_mut(resource.plural)
            .and_then(|objects| objects.remove(&identity));
        if removed.is_none() {
            return false;
        }

        let version = cluster.next_version();
        let event = WatchEvent::Deleted(Tombstone {
            identity,
            resource_version: Some(version.to_string()),
        });
        self.publish(
            &mut cluster,
            version,
            resource.plural,
            namespace.map(str::to_string),
            event,
        );
        true
    }

    /// Advance the cursor and emit a bookmark on open watches of `resource`
    pub async fn bookmark(&self, resource: &ResourceType) -> String {
        let mut cluster = self.cluster.write().await;
        let version = cluster.next_version();
        let event = WatchEvent::Bookmark(version.to_string());
        self.publish(&mut cluster, version, resource.plural, None, event);
        version.to_string()
    }

    /// Send an event to open watches without changing stored state
    ///
    /// Used to simulate duplicated or spurious deliveries.
    pub fn inject(&self, resource: &ResourceType, namespace: Option<&str>, event: WatchEvent) {
        let _ = self.signals.send(Signal::Event {
            plural: resource.plural,
            namespace: namespace.map(str::to_string),
            event,
        });
    }

    /// Forget all retained history; older cursors become stale
    pub async fn compact(&self) {
        let mut cluster = self.cluster.write().await;
        cluster.compacted_at = cluster.version;
        cluster.history.clear();
    }

    /// End every open watch stream cleanly
    pub fn close_watches(&self) {
        let _ = self.signals.send(Signal::Close);
    }

    /// Fail every open watch stream with a stale-cursor error
    pub async fn expire_watches(&self) {
        self.compact().await;
        let _ = self.signals.send(Signal::Expire);
    }

    /// Make the next `count` list calls fail with a transport error
    pub async fn fail_next_lists(&self, count: usize) {
        self.cluster.write().await.failing_lists = count;
    }

    /// Number of list calls received, including failed ones
    pub async fn list_calls(&self) -> usize {
        self.cluster.read().await.list_calls
    }

    /// Number of watch calls received, including rejected ones
    pub async fn watch_calls(&self) -> usize {
        self.cluster.read().await.watch_calls
    }

    /// Current resource version of the cluster
    pub async fn current_version(&self) -> String {
        self.cluster.read().await.version.to_string()
    }

    fn publish(
        &self,
        cluster: &mut MockCluster,
        version: u64,
        plural: &'static str,
        namespace: Option<String>,
        event: WatchEvent,
    ) {
        cluster.record(HistoryEntry {
            version,
            plural,
            namespace: namespace.clone(),
            event: event.clone(),
        });
        // No receivers is fine: nobody is watching yet
        let _ = self.signals.send(Signal::Event {
            plural,
            namespace,
            event,
        });
    }
}

impl Default for MockApi {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MockApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockApi")
            .field("watchers", &self.signals.receiver_count())
            .finish()
    }
}

fn in_scope(
    plural: &str,
    namespace: Option<&str>,
    want_plural: &str,
    want_namespace: Option<&str>,
) -> bool {
    plural == want_plural
        && match (want_namespace, namespace) {
            (None, _) => true,
            // Bookmarks carry no namespace and reach every watch of the kind
            (Some(_), None) => true,
            (Some(want), Some(ns)) => want == ns,
        }
}

#[async_trait]
impl ResourceApi for MockApi {
    async fn list(&self, resource: &ResourceType, namespace: Option<&str>) -> ApiResult<ObjectList> {
        let mut cluster = self.cluster.write().await;
        cluster.list_calls += 1;

        if cluster.failing_lists > 0 {
            cluster.failing_lists -= 1;
            return Err(ApiError::transport("injected list failure"));
        }

        let namespace = namespace.filter(|_| resource.namespaced);
        let items = cluster
            .objects
            .get(resource.plural)
            .map(|objects| {
                objects
                    .iter()
                    .filter(|(id, _)| namespace.is_none() || id.namespace() == namespace)
                    .map(|(_, obj)| obj.clone())
                    .collect()
            })
            .unwrap_or_default();

        Ok(ObjectList {
            items,
            resource_version: cluster.version.to_string(),
        })
    }

    async fn watch(
        &self,
        resource: &ResourceType,
        namespace: Option<&str>,
        resource_version: &str,
    ) -> ApiResult<WatchStream> {
        let mut cluster = self.cluster.write().await;
        cluster.watch_calls += 1;

        let start: u64 = resource_version
            .parse()
            .map_err(|_| ApiError::decode(format!("invalid resource version {:?}", resource_version)))?;
        if start < cluster.compacted_at {
            return Err(ApiError::Gone(format!(
                "too old resource version: {} ({})",
                start, cluster.compacted_at
            )));
        }

        let plural = resource.plural;
        let namespace = namespace.filter(|_| resource.namespaced).map(str::to_string);

        // Subscribe while holding the lock so no change falls between backlog and live feed
        let receiver = self.signals.subscribe();
        let backlog: Vec<ApiResult<WatchEvent>> = cluster
            .history
            .iter()
            .filter(|entry| entry.version > start)
            .filter(|entry| {
                in_scope(entry.plural, entry.namespace.as_deref(), plural, namespace.as_deref())
            })
            .map(|entry| Ok(entry.event.clone()))
            .collect();
        drop(cluster);

        let live = stream::unfold(Some(receiver), move |state| {
            let namespace = namespace.clone();
            async move {
                let mut receiver = state?;
                loop {
                    match receiver.recv().await {
                        Ok(Signal::Event {
                            plural: p,
                            namespace: ns,
                            event,
                        }) => {
                            if in_scope(p, ns.as_deref(), plural, namespace.as_deref()) {
                                return Some((Ok(event), Some(receiver)));
                            }
                        }
                        Ok(Signal::Close) | Err(broadcast::error::RecvError::Closed) => return None,
                        Ok(Signal::Expire) => {
                            return Some((Err(ApiError::Gone("watch expired".into())), None));
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => {
                            return Some((
                                Err(ApiError::Gone("watch fell behind".into())),
                                None,
                            ));
                        }
                    }
                }
            }
        });

        Ok(stream::iter(backlog).chain(live).boxed())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    const CONFIGMAPS: ResourceType = ResourceType::core("v1", "ConfigMap", "configmaps", true);

    fn configmap(ns: &str, name: &str) -> Value {
        json!({"metadata": {"name": name, "namespace": ns}})
    }

    #[tokio::test]
    async fn test_list_filters_namespace() {
        let api = MockApi::new();
        api.apply(&CONFIGMAPS, configmap("a", "one")).await;
        api.apply(&CONFIGMAPS, configmap("b", "two")).await;

        let all = api.list(&CONFIGMAPS, None).await.unwrap();
        assert_eq!(all.items.len(), 2);
        assert_eq!(all.resource_version, "2");

        let only_a = api.list(&CONFIGMAPS, Some("a")).await.unwrap();
        assert_eq!(only_a.items.len(), 1);
        assert_eq!(only_a.items[0].name(), Some("one"));
        assert_eq!(only_a.items[0].resource_version(), Some("1"));
    }

    #[tokio::test]
    async fn test_watch_replays_backlog_then_live() {
        let api = MockApi::new();
        let rv = api.apply(&CONFIGMAPS, configmap("a", "one")).await;
        api.apply(&CONFIGMAPS, configmap("a", "one")).await;

        let stream = api.watch(&CONFIGMAPS, Some("a"), &rv).await.unwrap();
        api.delete(&CONFIGMAPS, Some("a"), "one").await;
        api.close_watches();

        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].as_ref().unwrap().as_label(), "modified");
        assert_eq!(events[1].as_ref().unwrap().as_label(), "deleted");
    }

    #[tokio::test]
    async fn test_watch_skips_other_namespaces() {
        let api = MockApi::new();
        let stream = api.watch(&CONFIGMAPS, Some("a"), "0").await.unwrap();
        api.apply(&CONFIGMAPS, configmap("b", "other")).await;
        api.apply(&CONFIGMAPS, configmap("a", "mine")).await;
        api.close_watches();

        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 1);
        match events[0].as_ref().unwrap() {
            WatchEvent::Added(obj) => assert_eq!(obj.name(), Some("mine")),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_compacted_cursor_is_stale() {
        let api = MockApi::new();
        api.apply(&CONFIGMAPS, configmap("a", "one")).await;
        api.apply(&CONFIGMAPS, configmap("a", "two")).await;
        api.compact().await;

        let err = api.watch(&CONFIGMAPS, None, "1").await.err().unwrap();
        assert!(err.is_stale_cursor());
        assert!(api.watch(&CONFIGMAPS, None, "2").await.is_ok());
    }

    #[tokio::test]
    async fn test_expire_fails_open_streams() {
        let api = MockApi::new();
        let mut stream = api.watch(&CONFIGMAPS, None, "0").await.unwrap();
        api.expire_watches().await;

        let first = stream.next().await.unwrap();
        assert!(first.unwrap_err().is_stale_cursor());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_injected_list_failures() {
        let api = MockApi::new();
        api.fail_next_lists(1).await;
        assert!(api.list(&CONFIGMAPS, None).await.is_err());
        assert!(api.list(&CONFIGMAPS, None).await.is_ok());
        assert_eq!(api.list_calls().await, 2);
    }

    #[tokio::test]
    async fn test_delete_missing_object() {
        let api = MockApi::new();
        assert!(!api.delete(&CONFIGMAPS, Some("a"), "nope").await);
        assert_eq!(api.current_version().await, "0");
    }
}
