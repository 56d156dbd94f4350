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

//! Pod metrics

use super::{GeneratorError, KindSpec, MetricSet};
use crate::api::{RawObject, ResourceType};
use kubestate_metrics::{Metric, MetricFamilyDef, MetricType};
use serde_json::Value;
use std::sync::LazyLock;

const LABELS: &[&str] = &["namespace", "pod"];
const PHASES: &[&str] = &["Pending", "Running", "Succeeded", "Failed", "Unknown"];

static INFO: LazyLock<MetricFamilyDef> = LazyLock::new(|| {
    MetricFamilyDef::gauge(
        "kube_pod_info",
        "Information about pod.",
        &["namespace", "pod", "host_ip", "pod_ip", "uid", "node"],
    )
});

static CREATED: LazyLock<MetricFamilyDef> =
    LazyLock::new(|| MetricFamilyDef::gauge("kube_pod_created", "Unix creation timestamp", LABELS));

static STATUS_PHASE: LazyLock<MetricFamilyDef> = LazyLock::new(|| {
    MetricFamilyDef::gauge(
        "kube_pod_status_phase",
        "The pods current phase.",
        &["namespace", "pod", "phase"],
    )
});

static CONTAINER_RESTARTS: LazyLock<MetricFamilyDef> = LazyLock::new(|| {
    MetricFamilyDef::new(
        "kube_pod_container_status_restarts_total",
        "The number of container restarts per container.",
        MetricType::Counter,
        &["namespace", "pod", "container"],
    )
});

static FAMILIES: LazyLock<Vec<MetricFamilyDef>> = LazyLock::new(|| {
    vec![
        INFO.clone(),
        CREATED.clone(),
        STATUS_PHASE.clone(),
        CONTAINER_RESTARTS.clone(),
    ]
});

pub(super) const SPEC: KindSpec = KindSpec {
    name: "pods",
    resource: ResourceType::core("v1", "Pod", "pods", true),
    families,
    generate,
};

fn families() -> &'static [MetricFamilyDef] {
    &FAMILIES
}

fn generate(object: &RawObject) -> Result<Vec<Metric>, GeneratorError> {
    let mut set = MetricSet::namespaced(object)?;

    set.push(
        &INFO,
        1.0,
        &[
            object.str_at("/status/hostIP").unwrap_or_default(),
            object.str_at("/status/podIP").unwrap_or_default(),
            object.uid().unwrap_or_default(),
            object.str_at("/spec/nodeName").unwrap_or_default(),
        ],
    )?;
    set.push_created(&CREATED, object)?;
    set.push_state_set(&STATUS_PHASE, PHASES, object.str_at("/status/phase"))?;

    let statuses = object
        .pointer("/status/containerStatuses")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for status in statuses {
        let name = status
            .get("name")
            .and_then(Value::as_str)
            .ok_or(GeneratorError::MissingField("/status/containerStatuses/name"))?;
        let restarts = status
            .get("restartCount")
            .and_then(Value::as_i64)
            .unwrap_or_default();
        set.push(&CONTAINER_RESTARTS, restarts as f64, &[name])?;
    }

    Ok(set.finish())
}
