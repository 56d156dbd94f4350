//! kubestate Metrics Module
//!
//! The metric model shared by every part of kubestate, the text exposition
//! renderer used by the feed, and the self-telemetry registry.
//!
//! # Features
//!
//! - **Metric Records**: immutable samples whose label-key schema is shared per family
//! - **Streaming Exposition**: render into any `io::Write`, compressing or not
//! - **Validation**: detect label-schema drift without failing the scrape
//! - **Self-Telemetry**: Prometheus counters for watchers, stores and scrapes
//!
//! # Example
//!
//! ```
//! use kubestate_metrics::{ExpositionWriter, MetricFamilyDef};
//!
//! let info = MetricFamilyDef::gauge(
//!     "kube_configmap_info",
//!     "Information about configmap.",
//!     &["namespace", "configmap"],
//! );
//! let record = info
//!     .metric(vec!["default".to_string(), "settings".to_string()], 1.0)
//!     .unwrap();
//!
//! let mut writer = ExpositionWriter::new(Vec::new());
//! writer.write_collection(&[info], &[record]).unwrap();
//! let body = String::from_utf8(writer.into_inner()).unwrap();
//! assert!(body.contains(r#"kube_configmap_info{namespace="default",configmap="settings"} 1"#));
//! ```

pub mod exposition;
pub mod registry;
pub mod types;
pub mod validation;

pub use exposition::{render_to_string, ExpositionWriter, TEXT_CONTENT_TYPE};
pub use registry::TelemetryRegistry;
pub use types::{Metric, MetricError, MetricFamilyDef, MetricType};
pub use validation::{validate, ValidationIssue};
