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

static INFO: LazyLock<MetricFamilyDef> = LazyLock::new(|| {
    MetricFamilyDef::gauge(
        "kube_service_info",
        "Information about service.",
        &["namespace", "service", "cluster_ip"],
    )
});

static CREATED: LazyLock<MetricFamilyDef> = LazyLock::new(|| {
    MetricFamilyDef::gauge(
        "kube_service_created",
        "Unix creation timestamp",
        &["namespace", "service"],
    )
});

static SPEC_TYPE: LazyLock<MetricFamilyDef> = LazyLock::new(|| {
    MetricFamilyDef::gauge(
        "kube_service_spec_type",
        "Type about service.",
        &["namespace", "service", "type"],
    )
});

static FAMILIES: LazyLock<Vec<MetricFamilyDef>> =
    LazyLock::new(|| vec![INFO.clone(), CREATED.clone(), SPEC_TYPE.clone()]);

pub(super) const SPEC: KindSpec = KindSpec {
    name: "services",
    resource: ResourceType::core("v1", "Service", "services", true),
    families,
    generate,
};

fn families() -> &'static [MetricFamilyDef] {
    &FAMILIES
}

fn generate(object: &RawObject) -> Result<Vec<Metric>, GeneratorError> {
    let mut set = MetricSet::namespaced(object)?;
    set.push(&INFO, 1.0, &[object.str_at("/spec/clusterIP").unwrap_or_default()])?;
    set.push_created(&CREATED, object)?;
    set.push(&SPEC_TYPE, 1.0, &[object.str_at("/spec/type").unwrap_or("ClusterIP")])?;
    Ok(set.finish())
}
