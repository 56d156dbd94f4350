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

//! Object metrics store
//!
//! Holds the full rendering of every object one watcher has observed. Writers
//! (the owning watcher) replace whole entries; readers (scrapes) take a
//! snapshot of everything. Each write is a single swap under the write lock,
//! so a reader sees the store either entirely before or entirely after it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use kubestate_metrics::Metric;
use tokio::sync::RwLock;
use tracing::trace;

use crate::identity::ObjectIdentity;

type Entries = BTreeMap<ObjectIdentity, Arc<[Metric]>>;

/// Concurrent cache: object identity → rendered metrics of that object
///
/// Entries are reference counted so [`MetricsStore::list`] only copies
/// pointers while the read lock is held and flattens afterwards.
#[derive(Default)]
pub struct MetricsStore {
    entries: RwLock<Entries>,
}

impl MetricsStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `identity`
    ///
    /// `records` must be the rendering of exactly that object.
    pub async fn upsert(&self, identity: ObjectIdentity, records: Vec<Metric>) {
        let records: Arc<[Metric]> = records.into();
        trace!(object = %identity, records = records.len(), "Upserting store entry");

        let _previous = {
            let mut entries = self.entries.write().await;
            entries.insert(identity, records)
        };
    }

    /// Remove the entry for `identity`, returning whether it was present
    pub async fn delete(&self, identity: &ObjectIdentity) -> bool {
        let removed = {
            let mut entries = self.entries.write().await;
            entries.remove(identity)
        };
        trace!(object = %identity, present = removed.is_some(), "Deleting store entry");
        removed.is_some()
    }

    /// Atomically replace the whole contents
    ///
    /// The new map is built before the lock is taken and the old one is
    /// dropped after it is released; the critical section is one swap.
    /// When `entries` repeats an identity, the last rendering wins.
    pub async fn replace<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (ObjectIdentity, Vec<Metric>)>,
    {
        let fresh: Entries = entries
            .into_iter()
            .map(|(identity, records)| (identity, Arc::from(records)))
            .collect();
        let count = fresh.len();

        let stale = {
            let mut current = self.entries.write().await;
            std::mem::replace(&mut *current, fresh)
        };
        trace!(objects = count, dropped = stale.len(), "Replaced store contents");
    }

    /// Snapshot of every record currently held
    ///
    /// Records are grouped per object, objects ordered by identity.
    pub async fn list(&self) -> Vec<Metric> {
        let snapshot: Vec<Arc<[Metric]>> = {
            let entries = self.entries.read().await;
            entries.values().map(Arc::clone).collect()
        };

        let total = snapshot.iter().map(|records| records.len()).sum();
        let mut out = Vec::with_capacity(total);
        for records in &snapshot {
            out.extend(records.iter().cloned());
        }
        out
    }

    /// Rendering currently stored for one object
    pub async fn get(&self, identity: &ObjectIdentity) -> Option<Arc<[Metric]>> {
        self.entries.read().await.get(identity).map(Arc::clone)
    }

    /// Identities currently held, in order
    pub async fn identities(&self) -> Vec<ObjectIdentity> {
        self.entries.read().await.keys().cloned().collect()
    }

    /// Number of objects held
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no objects
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl fmt::Debug for MetricsStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsStore").finish_non_exhaustive()
    }
}
