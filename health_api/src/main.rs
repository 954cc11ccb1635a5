//! Main entry point for the health API binary

use anyhow::Result;
use health_core::{create_app, run_server, shutdown_signal, AppConfig, AppState, HealthAggregator, HealthMonitor};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    info!("Configuration loaded successfully");
    info!("Version: {}", config.service.version);
    info!("Environment: {}", config.service.environment);

    let addr: SocketAddr = config.bind_address().parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address: {}", e))?;

    let shutdown = CancellationToken::new();

    let aggregator = HealthAggregator::from_config(&config.health, shutdown.clone())
        .map_err(|e| anyhow::anyhow!("Failed to build health aggregator: {}", e))?;
    let aggregator = Arc::new(aggregator);

    info!(
        "Monitoring {} dependencies with a {}ms timeout",
        aggregator.len(),
        config.health.timeout_ms
    );

    let monitor = if config.monitor.enabled {
        let monitor = HealthMonitor::new(
            aggregator.clone(),
            config.monitor.interval(),
            config.health.timeout(),
        );
        Some(monitor.spawn(shutdown.clone()))
    } else {
        None
    };

    tokio::spawn(shutdown_signal(shutdown.clone()));

    let state = AppState::from_config(&config, aggregator);
    let app = create_app(state);

    let served = run_server(app, addr, shutdown.clone()).await;
    shutdown.cancel();

    if let Some(handle) = monitor {
        let grace = Duration::from_secs(config.server.shutdown_timeout_seconds);
        if tokio::time::timeout(grace, handle).await.is_err() {
            warn!("Background monitor did not stop within {:?}, terminating anyway", grace);
        }
    }

    served?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            let default_level = if cfg!(debug_assertions) {
                "debug"
            } else {
                "info"
            };

            format!(
                "{}={},health_core={},tower_http=debug,axum=info",
                env!("CARGO_CRATE_NAME").replace('-', "_"),
                default_level,
                default_level
            ).into()
        });

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let is_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    if is_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.pretty())
            .init();
    }
}
