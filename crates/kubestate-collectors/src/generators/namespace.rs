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

const PHASES: &[&str] = &["Active", "Terminating"];

static CREATED: LazyLock<MetricFamilyDef> = LazyLock::new(|| {
    MetricFamilyDef::gauge("kube_namespace_created", "Unix creation timestamp", &["namespace"])
});

// One record per object label so the key schema stays fixed
static LABELS: LazyLock<MetricFamilyDef> = LazyLock::new(|| {
    MetricFamilyDef::gauge(
        "kube_namespace_labels",
        "Kubernetes labels converted to Prometheus labels.",
        &["namespace", "label", "value"],
    )
});

static STATUS_PHASE: LazyLock<MetricFamilyDef> = LazyLock::new(|| {
    MetricFamilyDef::gauge(
        "kube_namespace_status_phase",
        "kubernetes namespace status phase.",
        &["namespace", "phase"],
    )
});

static FAMILIES: LazyLock<Vec<MetricFamilyDef>> =
    LazyLock::new(|| vec![CREATED.clone(), LABELS.clone(), STATUS_PHASE.clone()]);

pub(super) const SPEC: KindSpec = KindSpec {
    name: "namespaces",
    resource: ResourceType::core("v1", "Namespace", "namespaces", false),
    families,
    generate,
};

fn families() -> &'static [MetricFamilyDef] {
    &FAMILIES
}

fn generate(object: &RawObject) -> Result<Vec<Metric>, GeneratorError> {
    let mut set = MetricSet::cluster_scoped(object)?;
    set.push_created(&CREATED, object)?;
    for (key, value) in object.labels() {
        set.push(&LABELS, 1.0, &[key, value])?;
    }
    set.push_state_set(&STATUS_PHASE, PHASES, object.str_at("/status/phase"))?;
    Ok(set.finish())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_terminating_namespace() {
        let object = RawObject::new(json!({
            "metadata": {"name": "old", "labels": {"team": "core", "env": "dev"}},
            "status": {"phase": "Terminating"}
        }));

        let records = generate(&object).unwrap();
        let phases: Vec<_> = records
            .iter()
            .filter(|r| r.name() == "kube_namespace_status_phase")
            .map(|r| (r.label("phase").unwrap(), r.value()))
            .collect();
        assert_eq!(phases, vec![("Active", 0.0), ("Terminating", 1.0)]);

        let labels: Vec<_> = records
            .iter()
            .filter(|r| r.name() == "kube_namespace_labels")
            .map(|r| r.label("label").unwrap())
            .collect();
        assert_eq!(labels, vec!["env", "team"]);
    }
}
