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

use super::{bool_value, GeneratorError, KindSpec, MetricSet};
use crate::api::{RawObject, ResourceType};
use kubestate_metrics::{Metric, MetricFamilyDef};
use std::sync::LazyLock;

const LABELS: &[&str] = &["namespace", "deployment"];

fn gauge(name: &str, help: &str) -> MetricFamilyDef {
    MetricFamilyDef::gauge(name, help, LABELS)
}

static CREATED: LazyLock<MetricFamilyDef> =
    LazyLock::new(|| gauge("kube_deployment_created", "Unix creation timestamp"));

static SPEC_REPLICAS: LazyLock<MetricFamilyDef> = LazyLock::new(|| {
    gauge(
        "kube_deployment_spec_replicas",
        "Number of desired pods for a deployment.",
    )
});

static SPEC_PAUSED: LazyLock<MetricFamilyDef> = LazyLock::new(|| {
    gauge(
        "kube_deployment_spec_paused",
        "Whether the deployment is paused and will not be processed by the deployment controller.",
    )
});

static STATUS_REPLICAS: LazyLock<MetricFamilyDef> = LazyLock::new(|| {
    gauge(
        "kube_deployment_status_replicas",
        "The number of replicas per deployment.",
    )
});

static STATUS_REPLICAS_AVAILABLE: LazyLock<MetricFamilyDef> = LazyLock::new(|| {
    gauge(
        "kube_deployment_status_replicas_available",
        "The number of available replicas per deployment.",
    )
});

static METADATA_GENERATION: LazyLock<MetricFamilyDef> = LazyLock::new(|| {
    gauge(
        "kube_deployment_metadata_generation",
        "Sequence number representing a specific generation of the desired state.",
    )
});

static FAMILIES: LazyLock<Vec<MetricFamilyDef>> = LazyLock::new(|| {
    vec![
        CREATED.clone(),
        SPEC_REPLICAS.clone(),
        SPEC_PAUSED.clone(),
        STATUS_REPLICAS.clone(),
        STATUS_REPLICAS_AVAILABLE.clone(),
        METADATA_GENERATION.clone(),
    ]
});

pub(super) const SPEC: KindSpec = KindSpec {
    name: "deployments",
    resource: ResourceType::grouped("apps", "v1", "Deployment", "deployments", true),
    families,
    generate,
};

fn families() -> &'static [MetricFamilyDef] {
    &FAMILIES
}

fn generate(object: &RawObject) -> Result<Vec<Metric>, GeneratorError> {
    let mut set = MetricSet::namespaced(object)?;
    set.push_created(&CREATED, object)?;

    // An unset replica count defaults to one
    let replicas = match object.pointer("/spec/replicas") {
        None => 1,
        Some(value) => value
            .as_i64()
            .ok_or_else(|| GeneratorError::invalid_field("/spec/replicas", "not an integer"))?,
    };
    set.push(&SPEC_REPLICAS, replicas as f64, &[])?;
    set.push(
        &SPEC_PAUSED,
        bool_value(object.bool_at("/spec/paused").unwrap_or(false)),
        &[],
    )?;

    let count = |field: &str| object.i64_at(field).unwrap_or_default() as f64;
    set.push(&STATUS_REPLICAS, count("/status/replicas"), &[])?;
    set.push(
        &STATUS_REPLICAS_AVAILABLE,
        count("/status/availableReplicas"),
        &[],
    )?;
    set.push(
        &METADATA_GENERATION,
        count("/metadata/generation"),
        &[],
    )?;

    Ok(set.finish())
}
