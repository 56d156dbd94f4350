use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use kubestate_collectors::{api::HttpApi, Builder, ResourceApi, WatcherConfig};
use kubestate_config::Config;
use kubestate_metrics::TelemetryRegistry;
use kubestate_observability::{init_tracing_with_config, LogConfig};
use kubestate_server::{create_router, AppState, Args};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.load_config().await?;

    // Setup tracing
    let log_config = LogConfig::from_settings(
        &config.observability.log_level,
        &config.observability.log_format,
    )?;
    init_tracing_with_config(log_config)?;
    tracing::debug!("Configuration: {:?}", config);

    let api = build_api(&config).await?;
    let telemetry = TelemetryRegistry::new()?;
    let shutdown = CancellationToken::new();

    let built = Builder::new()
        .with_enabled_collectors(&config.collectors.enabled)
        .with_namespaces(&config.collectors.namespaces)
        .with_api(api)
        .with_watcher_config(WatcherConfig {
            resync_period: config.watcher.resync_period(),
            backoff_base: config.watcher.backoff_base(),
            backoff_max: config.watcher.backoff_max(),
        })
        .with_telemetry(telemetry.clone())
        .with_shutdown(shutdown.clone())
        .build()?;

    let state = Arc::new(
        AppState::new(built.collectors.clone(), telemetry).with_server_config(&config.server),
    );
    let app = create_router(state);

    let bind_addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    tracing::info!("kubestate listening on {}", bind_addr);

    let serve_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => tracing::info!("Shutdown requested"),
                _ = serve_shutdown.cancelled() => {}
            }
        })
        .await?;

    built.shutdown().await;
    tracing::info!("kubestate stopped");
    Ok(())
}

/// Connect to the API server named in the configuration
async fn build_api(config: &Config) -> Result<Arc<dyn ResourceApi>> {
    let mut api = HttpApi::new(config.apiserver.url.as_str());
    if let Some(path) = &config.apiserver.token_file {
        let token = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read token file {}", path.display()))?;
        api = api.with_token(token.trim());
    }
    tracing::info!("Using API server {}", api.base_url());
    Ok(Arc::new(api))
}
