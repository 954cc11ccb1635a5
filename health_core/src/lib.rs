//! Composite health aggregation: one endpoint reporting this service and
//! every service it depends on.

pub mod config;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;

pub use crate::config::{AppConfig, DependencyConfig, DependencyKind, HealthConfig};
pub use error::{AppError, Result};
pub use handlers::routes::create_routes;
pub use health::{
    DependencyName, DependencyProbe, GrpcProbe, HealthAggregator, HealthEntry, HealthMonitor,
    HealthReport, HealthStatus, HttpProbe, Probe, ProbeContext, ProbeError, ProbeOutcome,
    SelfProbe,
};

use axum::Router;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub app_name: String,
    pub version: String,
    pub environment: String,
    pub aggregator: Arc<HealthAggregator>,
    pub check_timeout: Duration,
}

impl AppState {
    pub fn new(aggregator: HealthAggregator) -> Self {
        Self {
            app_name: "health-api".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
            aggregator: Arc::new(aggregator),
            check_timeout: Duration::from_secs(5),
        }
    }

    pub fn from_config(config: &AppConfig, aggregator: Arc<HealthAggregator>) -> Self {
        Self {
            app_name: config.service.name.clone(),
            version: config.service.version.clone(),
            environment: config.service.environment.clone(),
            aggregator,
            check_timeout: config.health.timeout(),
        }
    }

    pub fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }
}

pub fn create_app(state: AppState) -> Router {
    with_middleware(Router::new().merge(create_routes())).with_state(state)
}

/// Wraps `router` in panic recovery and request logging. Logging is the
/// outer layer so recovered panics are logged as 500s.
pub fn with_middleware<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(middleware::recover::recover_layer())
        .layer(middleware::logging::logging_layer())
}

/// Serves `app` until `shutdown` is cancelled, then drains in-flight requests.
pub async fn run_server(app: Router, addr: SocketAddr, shutdown: CancellationToken) -> Result<()> {
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    Ok(())
}

/// Waits for Ctrl+C or SIGTERM and cancels `shutdown`.
pub async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
        _ = shutdown.cancelled() => return,
    }

    shutdown.cancel();
}
