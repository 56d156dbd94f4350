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

//! Per-kind metric generators
//!
//! A generator is a pure function from one raw object to the records that
//! describe it. Each supported kind registers a [`KindSpec`] in a static
//! table; the builder resolves configured kind names through [`lookup`].

mod configmap;
mod deployment;
mod namespace;
mod node;
mod pod;
mod secret;
mod service;

use crate::api::{RawObject, ResourceType};
use crate::error::GeneratorError;
use kubestate_metrics::{Metric, MetricFamilyDef};
use std::panic::{self, AssertUnwindSafe};

/// Generator signature: raw object to its full set of records
pub type GenerateFn = fn(&RawObject) -> Result<Vec<Metric>, GeneratorError>;

/// Accessor for a kind's family table
pub type FamiliesFn = fn() -> &'static [MetricFamilyDef];

/// Registration of one resource kind
#[derive(Debug, Clone, Copy)]
pub struct KindSpec {
    /// Configuration name of the kind (e.g. `configmaps`)
    pub name: &'static str,
    /// Remote resource it is listed and watched from
    pub resource: ResourceType,
    /// Families its generator emits, in exposition order
    pub families: FamiliesFn,
    /// The generator itself
    pub generate: GenerateFn,
}

static AVAILABLE: [KindSpec; 7] = [
    configmap::SPEC,
    deployment::SPEC,
    namespace::SPEC,
    node::SPEC,
    pod::SPEC,
    secret::SPEC,
    service::SPEC,
];

/// Every kind this build can collect
pub fn available_collectors() -> &'static [KindSpec] {
    &AVAILABLE
}

/// Find a kind by its configuration name
pub fn lookup(name: &str) -> Option<&'static KindSpec> {
    AVAILABLE.iter().find(|spec| spec.name == name)
}

/// Run a kind's generator, turning a panic into a [`GeneratorError`]
pub fn render(spec: &KindSpec, object: &RawObject) -> Result<Vec<Metric>, GeneratorError> {
    panic::catch_unwind(AssertUnwindSafe(|| (spec.generate)(object))).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(GeneratorError::Panicked(message))
    })
}

/// Accumulates one object's records, prefixing every record with the
/// object's identifying labels
pub(crate) struct MetricSet {
    base: Vec<String>,
    records: Vec<Metric>,
}

impl MetricSet {
    /// Base labels `[namespace, name]`
    pub(crate) fn namespaced(object: &RawObject) -> Result<Self, GeneratorError> {
        let namespace = object
            .namespace()
            .ok_or(GeneratorError::MissingField("/metadata/namespace"))?;
        let name = object
            .name()
            .ok_or(GeneratorError::MissingField("/metadata/name"))?;
        Ok(Self {
            base: vec![namespace.to_string(), name.to_string()],
            records: Vec::new(),
        })
    }

    /// Base labels `[name]`
    pub(crate) fn cluster_scoped(object: &RawObject) -> Result<Self, GeneratorError> {
        let name = object
            .name()
            .ok_or(GeneratorError::MissingField("/metadata/name"))?;
        Ok(Self {
            base: vec![name.to_string()],
            records: Vec::new(),
        })
    }

    /// Add one record of `family` with `extra` labels after the base labels
    pub(crate) fn push(
        &mut self,
        family: &MetricFamilyDef,
        value: f64,
        extra: &[&str],
    ) -> Result<(), GeneratorError> {
        let mut values = Vec::with_capacity(self.base.len() + extra.len());
        values.extend(self.base.iter().cloned());
        values.extend(extra.iter().map(|v| v.to_string()));
        self.records.push(family.metric(values, value)?);
        Ok(())
    }

    /// Creation timestamp in unix seconds, skipped when the object has none
    pub(crate) fn push_created(
        &mut self,
        family: &MetricFamilyDef,
        object: &RawObject,
    ) -> Result<(), GeneratorError> {
        match object.creation_timestamp() {
            Some(ts) => self.push(family, ts.timestamp() as f64, &[]),
            None => Ok(()),
        }
    }

    /// One record per candidate state; 1 for the current one, 0 otherwise
    pub(crate) fn push_state_set(
        &mut self,
        family: &MetricFamilyDef,
        states: &[&str],
        current: Option<&str>,
    ) -> Result<(), GeneratorError> {
        for state in states {
            let value = if current == Some(*state) { 1.0 } else { 0.0 };
            self.push(family, value, &[state])?;
        }
        Ok(())
    }

    pub(crate) fn finish(self) -> Vec<Metric> {
        self.records
    }
}

/// 1.0 for true, 0.0 for false
pub(crate) fn bool_value(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}
