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

//! Metric records and family definitions
//!
//! A [`Metric`] is one rendered sample: a name, an ordered set of label keys,
//! matching label values and a value. Records of the same family share the
//! family's label-key slice, so cloning a record never copies the key schema.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while constructing metric records
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    /// Label key and value sequences have different lengths
    #[error("metric {name}: {keys} label keys but {values} label values")]
    LabelArity {
        /// Metric name
        name: String,
        /// Number of label keys
        keys: usize,
        /// Number of label values
        values: usize,
    },
}

/// Exposition type of a metric family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricType {
    /// Value that can go up and down
    Gauge,
    /// Monotonically increasing value
    Counter,
    /// No type information
    Untyped,
}

impl MetricType {
    /// Get the `# TYPE` keyword for the exposition format
    pub fn as_label(&self) -> &'static str {
        match self {
            MetricType::Gauge => "gauge",
            MetricType::Counter => "counter",
            MetricType::Untyped => "untyped",
        }
    }
}

/// A single named, labeled sample
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    name: Arc<str>,
    label_keys: Arc<[String]>,
    label_values: Vec<String>,
    value: f64,
}

impl Metric {
    /// Create a record, checking that every label key has a value
    pub fn new(
        name: impl Into<Arc<str>>,
        label_keys: impl Into<Arc<[String]>>,
        label_values: Vec<String>,
        value: f64,
    ) -> Result<Self, MetricError> {
        let name = name.into();
        let label_keys = label_keys.into();

        if label_keys.len() != label_values.len() {
            return Err(MetricError::LabelArity {
                name: name.to_string(),
                keys: label_keys.len(),
                values: label_values.len(),
            });
        }

        Ok(Self {
            name,
            label_keys,
            label_values,
            value,
        })
    }

    /// Metric name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordered label keys
    pub fn label_keys(&self) -> &[String] {
        &self.label_keys
    }

    /// Label values, in the same order as [`Metric::label_keys`]
    pub fn label_values(&self) -> &[String] {
        &self.label_values
    }

    /// Sample value
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Iterate over `(key, value)` label pairs
    pub fn labels(&self) -> impl Iterator<Item = (&str, &str)> {
        self.label_keys
            .iter()
            .map(String::as_str)
            .zip(self.label_values.iter().map(String::as_str))
    }

    /// Look up a single label value by key
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels().find(|(k, _)| *k == key).map(|(_, v)| v)
    }
}

impl fmt::Display for Metric {
    /// Renders the record as one exposition line, without the trailing newline
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;

        if !self.label_keys.is_empty() {
            f.write_str("{")?;
            for (i, (key, value)) in self.labels().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{}=\"{}\"", key, EscapedLabelValue(value))?;
            }
            f.write_str("}")?;
        }

        write!(f, " {}", SampleValue(self.value))
    }
}

/// Static descriptor of a metric family
///
/// Declared once per resource kind. Carries no mutable state; its only job is
/// to stamp out records with a fixed label-key schema.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamilyDef {
    name: Arc<str>,
    help: String,
    metric_type: MetricType,
    label_keys: Arc<[String]>,
}

impl MetricFamilyDef {
    /// Create a family definition
    pub fn new(name: &str, help: &str, metric_type: MetricType, label_keys: &[&str]) -> Self {
        Self {
            name: Arc::from(name),
            help: help.to_string(),
            metric_type,
            label_keys: label_keys.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Create a gauge family definition
    pub fn gauge(name: &str, help: &str, label_keys: &[&str]) -> Self {
        Self::new(name, help, MetricType::Gauge, label_keys)
    }

    /// Family name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Help text
    pub fn help(&self) -> &str {
        &self.help
    }

    /// Exposition type
    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    /// Label-key schema shared by every record of this family
    pub fn label_keys(&self) -> &[String] {
        &self.label_keys
    }

    /// Produce a record of this family
    pub fn metric(&self, label_values: Vec<String>, value: f64) -> Result<Metric, MetricError> {
        Metric::new(
            Arc::clone(&self.name),
            Arc::clone(&self.label_keys),
            label_values,
            value,
        )
    }
}

/// Label value escaped for the text exposition format
pub(crate) struct EscapedLabelValue<'a>(pub(crate) &'a str);

impl fmt::Display for EscapedLabelValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0.chars() {
            match c {
                '\\' => f.write_str("\\\\")?,
                '"' => f.write_str("\\\"")?,
                '\n' => f.write_str("\\n")?,
                c => fmt::Write::write_char(f, c)?,
            }
        }
        Ok(())
    }
}

/// Help text escaped for the text exposition format
pub(crate) struct EscapedHelp<'a>(pub(crate) &'a str);

impl fmt::Display for EscapedHelp<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0.chars() {
            match c {
                '\\' => f.write_str("\\\\")?,
                '\n' => f.write_str("\\n")?,
                c => fmt::Write::write_char(f, c)?,
            }
        }
        Ok(())
    }
}

/// Sample value in Prometheus spelling (`NaN`, `+Inf`, `-Inf`)
pub(crate) struct SampleValue(pub(crate) f64);

impl fmt::Display for SampleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        if v.is_nan() {
            f.write_str("NaN")
        } else if v == f64::INFINITY {
            f.write_str("+Inf")
        } else if v == f64::NEG_INFINITY {
            f.write_str("-Inf")
        } else {
            write!(f, "{}", v)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configmap_info() -> MetricFamilyDef {
        MetricFamilyDef::gauge(
            "kube_configmap_info",
            "Information about configmap.",
            &["namespace", "configmap"],
        )
    }

    #[test]
    fn test_metric_label_arity_mismatch() {
        let keys: Vec<String> = vec!["namespace".into(), "configmap".into()];
        let err = Metric::new("kube_configmap_info", keys, vec!["default".into()], 1.0)
            .unwrap_err();
        assert_eq!(
            err,
            MetricError::LabelArity {
                name: "kube_configmap_info".to_string(),
                keys: 2,
                values: 1,
            }
        );
    }

    #[test]
    fn test_family_shares_label_keys() {
        let family = configmap_info();
        let a = family.metric(vec!["default".into(), "a".into()], 1.0).unwrap();
        let b = family.metric(vec!["default".into(), "b".into()], 1.0).unwrap();

        assert_eq!(a.label_keys(), b.label_keys());
        assert_eq!(a.label("configmap"), Some("a"));
        assert_eq!(b.label("missing"), None);
    }

    #[test]
    fn test_metric_display() {
        let family = configmap_info();
        let m = family.metric(vec!["default".into(), "cm1".into()], 1.0).unwrap();
        assert_eq!(
            m.to_string(),
            r#"kube_configmap_info{namespace="default",configmap="cm1"} 1"#
        );
    }

    #[test]
    fn test_metric_display_without_labels() {
        let m = Metric::new("up", Vec::<String>::new(), vec![], 0.5).unwrap();
        assert_eq!(m.to_string(), "up 0.5");
    }

    #[test]
    fn test_label_value_escaping() {
        let family = MetricFamilyDef::gauge("x", "x", &["v"]);
        let m = family
            .metric(vec!["a\"b\\c\nd".to_string()], 2.0)
            .unwrap();
        assert_eq!(m.to_string(), r#"x{v="a\"b\\c\nd"} 2"#);
    }

    #[test]
    fn test_special_values() {
        assert_eq!(SampleValue(f64::NAN).to_string(), "NaN");
        assert_eq!(SampleValue(f64::INFINITY).to_string(), "+Inf");
        assert_eq!(SampleValue(f64::NEG_INFINITY).to_string(), "-Inf");
        assert_eq!(SampleValue(1_526_000_000.0).to_string(), "1526000000");
    }

    #[test]
    fn test_metric_type_labels() {
        assert_eq!(MetricType::Gauge.as_label(), "gauge");
        assert_eq!(MetricType::Counter.as_label(), "counter");
        assert_eq!(MetricType::Untyped.as_label(), "untyped");
    }
}
