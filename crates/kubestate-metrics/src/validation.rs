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

//! Output validation
//!
//! Detects data-quality defects in rendered records. Nothing here fails hard:
//! callers log the issues and keep serving.

use std::collections::HashMap;
use std::fmt;

use crate::types::Metric;

/// A defect found in a set of records
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// Two records share a name but not a label-key schema
    LabelSchemaMismatch {
        /// Metric name
        name: String,
        /// Label keys of the first record seen with this name
        expected: Vec<String>,
        /// Label keys of the offending record
        found: Vec<String>,
    },
    /// Metric name is not a valid exposition identifier
    InvalidMetricName(String),
    /// Label key is not a valid exposition identifier
    InvalidLabelName {
        /// Metric name
        name: String,
        /// Offending label key
        label: String,
    },
    /// The same label key appears twice on one record
    DuplicateLabel {
        /// Metric name
        name: String,
        /// Repeated label key
        label: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::LabelSchemaMismatch {
                name,
                expected,
                found,
            } => write!(
                f,
                "metric {} has label keys {:?}, expected {:?}",
                name, found, expected
            ),
            ValidationIssue::InvalidMetricName(name) => {
                write!(f, "invalid metric name {:?}", name)
            }
            ValidationIssue::InvalidLabelName { name, label } => {
                write!(f, "metric {} has invalid label name {:?}", name, label)
            }
            ValidationIssue::DuplicateLabel { name, label } => {
                write!(f, "metric {} repeats label {:?}", name, label)
            }
        }
    }
}

/// Check a set of records for exposition defects
///
/// Each distinct problem is reported once, so a generator bug repeated
/// across thousands of objects yields one issue per offending schema.
pub fn validate(records: &[Metric]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut schemas: HashMap<&str, &[String]> = HashMap::new();

    for record in records {
        let name = record.name();

        match schemas.get(name) {
            Some(expected) => {
                if *expected != record.label_keys() {
                    let issue = ValidationIssue::LabelSchemaMismatch {
                        name: name.to_string(),
                        expected: expected.to_vec(),
                        found: record.label_keys().to_vec(),
                    };
                    if !issues.contains(&issue) {
                        issues.push(issue);
                    }
                }
                continue;
            }
            None => {
                schemas.insert(name, record.label_keys());
            }
        }

        if !is_valid_metric_name(name) {
            issues.push(ValidationIssue::InvalidMetricName(name.to_string()));
        }

        for (i, key) in record.label_keys().iter().enumerate() {
            if !is_valid_label_name(key) {
                issues.push(ValidationIssue::InvalidLabelName {
                    name: name.to_string(),
                    label: key.clone(),
                });
            }
            if record.label_keys()[..i].contains(key) {
                issues.push(ValidationIssue::DuplicateLabel {
                    name: name.to_string(),
                    label: key.clone(),
                });
            }
        }
    }

    issues
}

/// `[a-zA-Z_:][a-zA-Z0-9_:]*`
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`
pub fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
