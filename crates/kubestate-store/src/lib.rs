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

//! Object metrics cache for kubestate
//!
//! Each resource watcher owns one [`MetricsStore`] and is its only writer.
//! Collectors read from any number of stores concurrently.
//!
//! # Concurrency
//!
//! - **Readers**: unbounded; each [`MetricsStore::list`] call is a consistent snapshot
//! - **Writers**: one per watcher; every mutation commits in a single swap
//! - **Ordering**: identities are kept sorted, so listings are deterministic
//!
//! # Example
//!
//! ```
//! use kubestate_metrics::MetricFamilyDef;
//! use kubestate_store::{MetricsStore, ObjectIdentity};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let info = MetricFamilyDef::gauge("kube_secret_info", "Information about secret.", &["namespace", "secret"]);
//! let store = MetricsStore::new();
//!
//! let id = ObjectIdentity::namespaced("Secret", "default", "token");
//! let records = vec![info.metric(vec!["default".into(), "token".into()], 1.0).unwrap()];
//! store.upsert(id.clone(), records).await;
//! assert_eq!(store.list().await.len(), 1);
//!
//! store.delete(&id).await;
//! assert!(store.is_empty().await);
//! # }
//! ```

pub mod identity;
pub mod store;

pub use identity::ObjectIdentity;
pub use store::MetricsStore;
