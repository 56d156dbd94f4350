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

use super::{GeneratorError, KindSpec, MetricSet};
use crate::api::{RawObject, ResourceType};
use kubestate_metrics::{Metric, MetricFamilyDef};
use std::sync::LazyLock;

const LABELS: &[&str] = &["namespace", "configmap"];

static INFO: LazyLock<MetricFamilyDef> =
    LazyLock::new(|| MetricFamilyDef::gauge("kube_configmap_info", "Information about configmap.", LABELS));

static CREATED: LazyLock<MetricFamilyDef> =
    LazyLock::new(|| MetricFamilyDef::gauge("kube_configmap_created", "Unix creation timestamp", LABELS));

static RESOURCE_VERSION: LazyLock<MetricFamilyDef> = LazyLock::new(|| {
    MetricFamilyDef::gauge(
        "kube_configmap_metadata_resource_version",
        "Resource version representing a specific version of the configmap.",
        &["namespace", "configmap", "resource_version"],
    )
});

static FAMILIES: LazyLock<Vec<MetricFamilyDef>> =
    LazyLock::new(|| vec![INFO.clone(), CREATED.clone(), RESOURCE_VERSION.clone()]);

pub(super) const SPEC: KindSpec = KindSpec {
    name: "configmaps",
    resource: ResourceType::core("v1", "ConfigMap", "configmaps", true),
    families,
    generate,
};

fn families() -> &'static [MetricFamilyDef] {
    &FAMILIES
}

fn generate(object: &RawObject) -> Result<Vec<Metric>, GeneratorError> {
    let mut set = MetricSet::namespaced(object)?;
    set.push(&INFO, 1.0, &[])?;
    set.push_created(&CREATED, object)?;
    set.push(&RESOURCE_VERSION, 1.0, &[object.resource_version().unwrap_or_default()])?;
    Ok(set.finish())
}
