//! # kubestate Observability
//!
//! Structured logging for the kubestate exporter, built on `tracing`.
//!
//! ## Features
//!
//! - **Formats**: pretty, compact or JSON output
//! - **Filtering**: level from the configuration file, falling back to `RUST_LOG`
//! - **Quiet HTTP stack**: bare levels keep hyper/reqwest chatter at `warn`
//!
//! ## Example
//!
//! ```ignore
//! use kubestate_observability::{init_tracing_with_config, LogConfig};
//!
//! let config = LogConfig::from_settings("info", "json")?;
//! init_tracing_with_config(config)?;
//! tracing::info!(port = 8080, "Exporter listening");
//! ```

pub mod config;
pub mod initialization;

pub use config::{LogConfig, LogError, LogFormat, LogOutput};
pub use initialization::{init_tracing, init_tracing_with_config};
