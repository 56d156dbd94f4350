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

static INFO: LazyLock<MetricFamilyDef> = LazyLock::new(|| {
    MetricFamilyDef::gauge(
        "kube_node_info",
        "Information about a cluster node.",
        &[
            "node",
            "kernel_version",
            "os_image",
            "container_runtime_version",
            "kubelet_version",
            "provider_id",
        ],
    )
});

static CREATED: LazyLock<MetricFamilyDef> =
    LazyLock::new(|| MetricFamilyDef::gauge("kube_node_created", "Unix creation timestamp", &["node"]));

static SPEC_UNSCHEDULABLE: LazyLock<MetricFamilyDef> = LazyLock::new(|| {
    MetricFamilyDef::gauge(
        "kube_node_spec_unschedulable",
        "Whether a node can schedule new pods.",
        &["node"],
    )
});

static FAMILIES: LazyLock<Vec<MetricFamilyDef>> =
    LazyLock::new(|| vec![INFO.clone(), CREATED.clone(), SPEC_UNSCHEDULABLE.clone()]);

pub(super) const SPEC: KindSpec = KindSpec {
    name: "nodes",
    resource: ResourceType::core("v1", "Node", "nodes", false),
    families,
    generate,
};

fn families() -> &'static [MetricFamilyDef] {
    &FAMILIES
}

fn generate(object: &RawObject) -> Result<Vec<Metric>, GeneratorError> {
    let mut set = MetricSet::cluster_scoped(object)?;
    let info = |field: &str| object.str_at(field).unwrap_or_default();

    set.push(
        &INFO,
        1.0,
        &[
            info("/status/nodeInfo/kernelVersion"),
            info("/status/nodeInfo/osImage"),
            info("/status/nodeInfo/containerRuntimeVersion"),
            info("/status/nodeInfo/kubeletVersion"),
            info("/spec/providerID"),
        ],
    )?;
    set.push_created(&CREATED, object)?;
    set.push(
        &SPEC_UNSCHEDULABLE,
        bool_value(object.bool_at("/spec/unschedulable").unwrap_or(false)),
        &[],
    )?;
    Ok(set.finish())
}
