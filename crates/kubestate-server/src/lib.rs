//! kubestate feed server
//!
//! Library half of the `kubestate` binary; integration tests drive the
//! router through these exports.

pub mod config;
pub mod handlers;
pub mod state;

pub use config::Args;
pub use state::AppState;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Create the axum router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::get_index))
        .route("/metrics", get(handlers::get_metrics))
        .route("/telemetry", get(handlers::get_telemetry))
        .route("/health", get(handlers::get_health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
