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

//! Per-kind collectors
//!
//! A [`Collector`] owns the stores of one resource kind (one per watched
//! namespace) and concatenates their contents on demand.

use crate::generators::KindSpec;
use kubestate_metrics::{ExpositionWriter, Metric, MetricFamilyDef};
use kubestate_store::MetricsStore;
use std::io::{self, Write};
use std::sync::Arc;

/// Read side of one resource kind
#[derive(Debug, Clone)]
pub struct Collector {
    spec: &'static KindSpec,
    stores: Vec<Arc<MetricsStore>>,
}

impl Collector {
    /// Create a collector over `stores`
    pub fn new(spec: &'static KindSpec, stores: Vec<Arc<MetricsStore>>) -> Self {
        Self { spec, stores }
    }

    /// Configuration name of the kind
    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    /// Families this collector's records belong to, in exposition order
    pub fn families(&self) -> &'static [MetricFamilyDef] {
        (self.spec.families)()
    }

    /// Stores owned by this collector
    pub fn stores(&self) -> &[Arc<MetricsStore>] {
        &self.stores
    }

    /// Snapshot of every record of every store
    ///
    /// Each store contributes one consistent snapshot; stores are visited in
    /// construction order.
    pub async fn emit(&self) -> Vec<Metric> {
        let mut records = Vec::new();
        for store in &self.stores {
            records.extend(store.list().await);
        }
        records
    }

    /// Object count of each store, in construction order
    pub async fn store_sizes(&self) -> Vec<usize> {
        let mut sizes = Vec::with_capacity(self.stores.len());
        for store in &self.stores {
            sizes.push(store.len().await);
        }
        sizes
    }
}

/// Render every collector's output, one collector after another
///
/// Returns the number of records written.
pub async fn render_all<W: Write>(
    collectors: &[Collector],
    writer: &mut ExpositionWriter<W>,
) -> io::Result<usize> {
    let mut written = 0;
    for collector in collectors {
        let records = collector.emit().await;
        written += records.len();
        writer.write_collection(collector.families(), &records)?;
    }
    writer.flush()?;
    Ok(written)
}
