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

//! Remote API capability
//!
//! The watcher only needs two calls from the cluster: a full list that returns
//! a resume cursor, and a change stream that starts at such a cursor. Both are
//! expressed by the [`ResourceApi`] trait so that the transport can be swapped
//! for the in-memory [`mock::MockApi`] in tests.

pub mod http;
pub mod mock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use kubestate_store::ObjectIdentity;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::error::ApiResult;

pub use http::HttpApi;
pub use mock::MockApi;

/// Descriptor of one resource kind on the remote API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceType {
    /// API group, empty for the core group
    pub group: &'static str,
    /// API version within the group
    pub version: &'static str,
    /// Object kind (e.g. `ConfigMap`)
    pub kind: &'static str,
    /// Plural resource name used in paths (e.g. `configmaps`)
    pub plural: &'static str,
    /// Whether objects of this kind live in a namespace
    pub namespaced: bool,
}

impl ResourceType {
    /// Resource in the core (`/api`) group
    pub const fn core(
        version: &'static str,
        kind: &'static str,
        plural: &'static str,
        namespaced: bool,
    ) -> Self {
        Self {
            group: "",
            version,
            kind,
            plural,
            namespaced,
        }
    }

    /// Resource in a named (`/apis/<group>`) group
    pub const fn grouped(
        group: &'static str,
        version: &'static str,
        kind: &'static str,
        plural: &'static str,
        namespaced: bool,
    ) -> Self {
        Self {
            group,
            version,
            kind,
            plural,
            namespaced,
        }
    }

    /// `apiVersion` string (`v1`, `apps/v1`)
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.to_string()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Collection path relative to the server root
    pub fn collection_path(&self, namespace: Option<&str>) -> String {
        let prefix = if self.group.is_empty() {
            format!("api/{}", self.version)
        } else {
            format!("apis/{}/{}", self.group, self.version)
        };

        match namespace {
            Some(ns) if self.namespaced => {
                format!("{}/namespaces/{}/{}", prefix, ns, self.plural)
            }
            _ => format!("{}/{}", prefix, self.plural),
        }
    }
}

/// An unstructured remote object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawObject(Value);

impl RawObject {
    /// Wrap a JSON document
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Underlying JSON document
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Value at a JSON pointer (`/spec/replicas`)
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        self.0.pointer(pointer)
    }

    /// String at a JSON pointer
    pub fn str_at(&self, pointer: &str) -> Option<&str> {
        self.pointer(pointer).and_then(Value::as_str)
    }

    /// Integer at a JSON pointer
    pub fn i64_at(&self, pointer: &str) -> Option<i64> {
        self.pointer(pointer).and_then(Value::as_i64)
    }

    /// Boolean at a JSON pointer
    pub fn bool_at(&self, pointer: &str) -> Option<bool> {
        self.pointer(pointer).and_then(Value::as_bool)
    }

    /// `metadata.name`
    pub fn name(&self) -> Option<&str> {
        self.str_at("/metadata/name")
    }

    /// `metadata.namespace`
    pub fn namespace(&self) -> Option<&str> {
        self.str_at("/metadata/namespace")
    }

    /// `metadata.uid`
    pub fn uid(&self) -> Option<&str> {
        self.str_at("/metadata/uid")
    }

    /// `metadata.resourceVersion`
    pub fn resource_version(&self) -> Option<&str> {
        self.str_at("/metadata/resourceVersion")
    }

    /// `metadata.creationTimestamp`, parsed as RFC 3339
    pub fn creation_timestamp(&self) -> Option<DateTime<Utc>> {
        self.str_at("/metadata/creationTimestamp")
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc))
    }

    /// `metadata.labels`
    pub fn labels(&self) -> BTreeMap<&str, &str> {
        self.pointer("/metadata/labels")
            .and_then(Value::as_object)
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.as_str(), v)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Store key of this object, `None` when it has no name
    pub fn identity(&self, kind: &str) -> Option<ObjectIdentity> {
        self.name()
            .map(|name| ObjectIdentity::new(kind, self.namespace(), name))
    }
}

impl From<Value> for RawObject {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Result of a full list call
#[derive(Debug, Clone, Default)]
pub struct ObjectList {
    /// Every object currently present
    pub items: Vec<RawObject>,
    /// Cursor to start the change stream from
    pub resource_version: String,
}

/// Deletion notice; carries identity only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tombstone {
    /// Identity of the deleted object
    pub identity: ObjectIdentity,
    /// Cursor position of the deletion, when known
    pub resource_version: Option<String>,
}

impl Tombstone {
    /// Build a tombstone from the last known state of an object
    pub fn from_object(kind: &str, object: &RawObject) -> Option<Self> {
        object.identity(kind).map(|identity| Self {
            identity,
            resource_version: object.resource_version().map(str::to_string),
        })
    }
}

/// One change observed on the stream
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// Object created
    Added(RawObject),
    /// Object changed
    Modified(RawObject),
    /// Object removed
    Deleted(Tombstone),
    /// Cursor advanced without an object change
    Bookmark(String),
}

impl WatchEvent {
    /// Cursor position carried by this event
    pub fn resource_version(&self) -> Option<&str> {
        match self {
            WatchEvent::Added(obj) | WatchEvent::Modified(obj) => obj.resource_version(),
            WatchEvent::Deleted(tombstone) => tombstone.resource_version.as_deref(),
            WatchEvent::Bookmark(rv) => Some(rv),
        }
    }

    /// Get string label for telemetry
    pub fn as_label(&self) -> &'static str {
        match self {
            WatchEvent::Added(_) => "added",
            WatchEvent::Modified(_) => "modified",
            WatchEvent::Deleted(_) => "deleted",
            WatchEvent::Bookmark(_) => "bookmark",
        }
    }
}

/// Change stream returned by [`ResourceApi::watch`]
///
/// An `Err` item ends the usable life of the stream. A stream that simply ends
/// may be resumed from the last observed cursor.
pub type WatchStream = BoxStream<'static, ApiResult<WatchEvent>>;

/// List/watch capability of the remote API
///
/// Implementations must be `Send + Sync + Debug` so one instance can be
/// shared by every watcher task.
///
/// # Stale cursors
///
/// When the requested resume point is no longer retained, `watch` (or an item
/// of the returned stream) must fail with an error for which
/// [`ApiError::is_stale_cursor`](crate::error::ApiError::is_stale_cursor) is true.
#[async_trait]
pub trait ResourceApi: Send + Sync + Debug {
    /// Fetch every object of `resource`, optionally restricted to a namespace
    async fn list(&self, resource: &ResourceType, namespace: Option<&str>)
        -> ApiResult<ObjectList>;

    /// Open a change stream starting after `resource_version`
    async fn watch(
        &self,
        resource: &ResourceType,
        namespace: Option<&str>,
        resource_version: &str,
    ) -> ApiResult<WatchStream>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DEPLOYMENTS: ResourceType =
        ResourceType::grouped("apps", "v1", "Deployment", "deployments", true);
    const NODES: ResourceType = ResourceType::core("v1", "Node", "nodes", false);

    #[test]
    fn trait_is_object_safe() {
        fn _check_object_safe(_: &dyn ResourceApi) {}
    }

    #[test]
    fn test_collection_paths() {
        assert_eq!(
            DEPLOYMENTS.collection_path(Some("default")),
            "apis/apps/v1/namespaces/default/deployments"
        );
        assert_eq!(DEPLOYMENTS.collection_path(None), "apis/apps/v1/deployments");
        assert_eq!(NODES.collection_path(Some("ignored")), "api/v1/nodes");
        assert_eq!(DEPLOYMENTS.api_version(), "apps/v1");
        assert_eq!(NODES.api_version(), "v1");
    }

    #[test]
    fn test_raw_object_accessors() {
        let obj = RawObject::new(json!({
            "metadata": {
                "name": "web",
                "namespace": "prod",
                "uid": "1234",
                "resourceVersion": "42",
                "creationTimestamp": "2018-04-05T10:00:00Z",
                "labels": {"app": "web", "tier": "frontend"}
            },
            "spec": {"replicas": 3, "paused": false}
        }));

        assert_eq!(obj.name(), Some("web"));
        assert_eq!(obj.namespace(), Some("prod"));
        assert_eq!(obj.uid(), Some("1234"));
        assert_eq!(obj.resource_version(), Some("42"));
        assert_eq!(obj.i64_at("/spec/replicas"), Some(3));
        assert_eq!(obj.bool_at("/spec/paused"), Some(false));
        assert_eq!(
            obj.creation_timestamp().map(|ts| ts.timestamp()),
            Some(1_522_922_400)
        );
        assert_eq!(obj.labels().get("tier"), Some(&"frontend"));
        assert_eq!(
            obj.identity("Deployment"),
            Some(ObjectIdentity::namespaced("Deployment", "prod", "web"))
        );
    }

    #[test]
    fn test_identity_requires_name() {
        let obj = RawObject::new(json!({"metadata": {"namespace": "prod"}}));
        assert!(obj.identity("Pod").is_none());
    }

    #[test]
    fn test_tombstone_from_metadata_only() {
        let obj = RawObject::new(json!({
            "metadata": {"name": "gone", "resourceVersion": "77"}
        }));
        let tombstone = Tombstone::from_object("Node", &obj).unwrap();
        assert_eq!(tombstone.identity, ObjectIdentity::cluster_scoped("Node", "gone"));

        let event = WatchEvent::Deleted(tombstone);
        assert_eq!(event.resource_version(), Some("77"));
        assert_eq!(event.as_label(), "deleted");
    }
}
