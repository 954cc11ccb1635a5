//! Periodic background health checks, logged but never served

use super::aggregator::HealthAggregator;
use super::context::ProbeContext;
use crate::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct HealthMonitor {
    aggregator: Arc<HealthAggregator>,
    interval: Duration,
    timeout: Duration,
}

impl HealthMonitor {
    pub fn new(aggregator: Arc<HealthAggregator>, interval: Duration, timeout: Duration) -> Self {
        Self {
            aggregator,
            interval,
            timeout,
        }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Checks every `interval` until `shutdown` fires. The first check runs
    /// one full interval after start.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_seconds = self.interval.as_secs(),
            "Started background health monitor"
        );

        let parent = ProbeContext::from_token(shutdown.clone());
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.interval,
            self.interval,
        );
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let ctx = parent.child_with_timeout(self.timeout);
            match self.aggregator.health_check(&ctx).await {
                Ok(report) => {
                    info!("Background health check passed: {}", report.summary());
                }
                Err(AppError::ServiceUnavailable(report)) => {
                    let failing: Vec<String> = report
                        .unhealthy()
                        .map(|outcome| {
                            format!(
                                "{} ({})",
                                outcome.name,
                                outcome.detail.as_deref().unwrap_or("unknown")
                            )
                        })
                        .collect();
                    warn!("Background health check failed: {}", failing.join(", "));
                }
                Err(e) => {
                    error!("Background health check could not run: {}", e);
                }
            }
        }

        info!("Background health monitor stopped");
    }
}
