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

//! Resource watchers, generators and collectors for kubestate
//!
//! This crate is the synchronization pipeline between the cluster API and the
//! metrics feed:
//!
//! - [`api`]: list/watch capability ([`ResourceApi`]) with an HTTP client and
//!   an in-memory mock
//! - [`generators`]: pure per-kind functions from raw objects to metric records
//! - [`watcher`]: the per-(kind, namespace) state machine that keeps a
//!   [`MetricsStore`](kubestate_store::MetricsStore) eventually consistent
//! - [`Collector`] and [`Builder`]: composition of many watchers into one feed
//!
//! # Example
//!
//! ```rust,no_run
//! use kubestate_collectors::{api::HttpApi, render_all, Builder};
//! use kubestate_metrics::ExpositionWriter;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let built = Builder::new()
//!         .with_enabled_collectors(["deployments"])
//!         .with_api(Arc::new(HttpApi::new("http://127.0.0.1:8001")))
//!         .build()?;
//!
//!     let mut writer = ExpositionWriter::new(std::io::stdout());
//!     render_all(&built.collectors, &mut writer).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod builder;
pub mod collector;
pub mod error;
pub mod generators;
pub mod watcher;

pub use api::{ResourceApi, ResourceType};
pub use builder::{Builder, BuiltCollectors};
pub use collector::{render_all, Collector};
pub use error::{ApiError, ApiResult, BuildError, GeneratorError};
pub use generators::{available_collectors, lookup, KindSpec};
pub use watcher::{RelistReason, ResourceWatcher, WatcherConfig, WatcherState};
