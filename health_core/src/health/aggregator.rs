//! Concurrent fan-out of every registered probe into one health report

use super::context::{DoneReason, ProbeContext};
use super::probe::{DependencyProbe, Probe, ProbeError, SelfProbe};
use super::report::{DependencyName, HealthReport, ProbeOutcome};
use crate::config::HealthConfig;
use crate::error::{AppError, Result};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct RegisteredProbe {
    name: DependencyName,
    probe: Arc<dyn DependencyProbe>,
}

/// Owns the probe set for the life of the process and runs it on demand.
///
/// Every call to [`HealthAggregator::health_check`] is independent: nothing
/// is cached between calls and the aggregator itself holds no mutable state.
#[derive(Default)]
pub struct HealthAggregator {
    probes: Vec<RegisteredProbe>,
}

impl HealthAggregator {
    pub fn new() -> Self {
        Self { probes: Vec::new() }
    }

    /// Builds the probe set from configuration: the self probe first, then
    /// each configured dependency in order.
    pub fn from_config(config: &HealthConfig, shutdown: CancellationToken) -> Result<Self> {
        let mut aggregator = HealthAggregator::new().register(
            config.self_name.as_str(),
            Probe::Local(SelfProbe::new(shutdown)),
        )?;

        let dependencies = config.dependencies();
        if dependencies.is_empty() {
            warn!("No external dependencies configured; health reports will only cover this service");
        }

        for dependency in &dependencies {
            let probe = Probe::from_config(dependency)?;
            info!(
                dependency = %dependency.name,
                kind = probe.kind(),
                target = %dependency.url,
                "Registered dependency probe"
            );
            aggregator = aggregator.register(dependency.name.as_str(), probe)?;
        }

        Ok(aggregator)
    }

    pub fn register<N, P>(mut self, name: N, probe: P) -> Result<Self>
    where
        N: Into<DependencyName>,
        P: DependencyProbe + 'static,
    {
        let name = name.into();
        if name.as_str().is_empty() {
            return Err(AppError::Configuration(
                "dependency name cannot be empty".to_string(),
            ));
        }
        if self.probes.iter().any(|registered| registered.name == name) {
            return Err(AppError::Configuration(format!(
                "dependency '{}' registered twice",
                name
            )));
        }

        self.probes.push(RegisteredProbe {
            name,
            probe: Arc::new(probe),
        });
        Ok(self)
    }

    pub fn names(&self) -> impl Iterator<Item = &DependencyName> {
        self.probes.iter().map(|registered| &registered.name)
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Runs every probe concurrently under `ctx` and reports all of them.
    ///
    /// The report always holds one outcome per registered probe, in
    /// registration order. Probes still running when `ctx` ends are reported
    /// unhealthy with the context's reason and are cancelled. Returns
    /// `ServiceUnavailable` carrying the report when any outcome is unhealthy.
    pub async fn health_check(&self, ctx: &ProbeContext) -> Result<HealthReport> {
        if self.probes.is_empty() {
            return Err(AppError::Configuration(
                "no dependencies registered".to_string(),
            ));
        }

        let total = self.probes.len();
        info!(dependencies = total, "Running dependency health checks");

        // Cancelled on return so stragglers abandon their I/O.
        let scope = ctx.child();
        let _scope_guard = scope.drop_guard();

        let (results_tx, mut results_rx) = mpsc::channel::<(usize, ProbeOutcome)>(total);
        let mut units = JoinSet::new();

        for (slot, registered) in self.probes.iter().enumerate() {
            let name = registered.name.clone();
            let probe = Arc::clone(&registered.probe);
            let unit_ctx = scope.child();
            let results_tx = results_tx.clone();

            units.spawn(async move {
                let outcome = run_probe(name, probe, unit_ctx).await;
                // Capacity equals the number of units, so this never blocks or fails
                // unless the aggregator has already given up on the results.
                let _ = results_tx.try_send((slot, outcome));
            });
        }
        drop(results_tx);

        let mut slots: Vec<Option<ProbeOutcome>> = (0..total).map(|_| None).collect();
        let mut pending = total;
        let mut interrupted: Option<DoneReason> = None;

        let expired = ctx.done();
        tokio::pin!(expired);

        while pending > 0 {
            tokio::select! {
                biased;
                received = results_rx.recv() => match received {
                    Some((slot, outcome)) => {
                        if slots[slot].replace(outcome).is_none() {
                            pending -= 1;
                        }
                    }
                    None => break,
                },
                reason = &mut expired => {
                    warn!(
                        pending,
                        reason = %reason,
                        "Health check context ended before all dependencies reported"
                    );
                    interrupted = Some(reason);
                    break;
                }
            }
        }

        units.abort_all();

        let outcomes: Vec<ProbeOutcome> = slots
            .into_iter()
            .zip(&self.probes)
            .map(|(slot, registered)| {
                slot.unwrap_or_else(|| {
                    let detail = match interrupted.or_else(|| ctx.err()) {
                        Some(reason) => reason.to_string(),
                        None => "probe did not report".to_string(),
                    };
                    warn!(dependency = %registered.name, detail = %detail, "Dependency did not report in time");
                    ProbeOutcome::unhealthy(
                        registered.name.clone(),
                        detail,
                        std::time::Duration::ZERO,
                    )
                })
            })
            .collect();

        let report = HealthReport::from_outcomes(outcomes);
        info!(status = %report.overall(), "Health check completed - {}", report.summary());

        if report.is_healthy() {
            Ok(report)
        } else {
            Err(AppError::ServiceUnavailable(Box::new(report)))
        }
    }

    /// Runs a single registered probe. `None` when no probe has that name.
    pub async fn check_dependency(&self, ctx: &ProbeContext, name: &str) -> Option<ProbeOutcome> {
        let registered = self
            .probes
            .iter()
            .find(|registered| registered.name.as_str() == name)?;

        let scope = ctx.child();
        let _scope_guard = scope.drop_guard();

        Some(run_probe(registered.name.clone(), Arc::clone(&registered.probe), scope.child()).await)
    }
}

/// One unit of the fan-out: always yields exactly one outcome, whether the
/// probe succeeds, fails, panics, or outlives its context.
async fn run_probe(
    name: DependencyName,
    probe: Arc<dyn DependencyProbe>,
    ctx: ProbeContext,
) -> ProbeOutcome {
    let started = Instant::now();

    let result = match ctx.err() {
        Some(reason) => Err(ProbeError::from(reason)),
        None => {
            let checked = AssertUnwindSafe(probe.check(&ctx)).catch_unwind();
            tokio::select! {
                biased;
                reason = ctx.done() => Err(ProbeError::from(reason)),
                checked = checked => checked.unwrap_or(Err(ProbeError::Panicked)),
            }
        }
    };
    let elapsed = started.elapsed();

    match result {
        Ok(()) => {
            debug!(dependency = %name, kind = probe.kind(), ?elapsed, "Dependency healthy");
            ProbeOutcome::healthy(name, elapsed)
        }
        Err(err) => {
            warn!(dependency = %name, kind = probe.kind(), ?elapsed, error = %err, "Dependency unhealthy");
            ProbeOutcome::unhealthy(name, err.to_string(), elapsed)
        }
    }
}
