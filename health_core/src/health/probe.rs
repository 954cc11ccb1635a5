//! The probe capability and the probe kinds selectable from configuration

use super::context::{DoneReason, ProbeContext};
use super::grpc::GrpcProbe;
use super::http::HttpProbe;
use crate::config::{DependencyConfig, DependencyKind};
use crate::Result;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Why a single dependency check did not succeed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("{0}")]
    Failed(String),

    #[error("unexpected status code: {0}")]
    UnexpectedStatus(u16),

    #[error("{0}")]
    Transport(String),

    #[error("HealthCheck RPC failed: {0}")]
    Rpc(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("context canceled")]
    Cancelled,

    #[error("probe panicked")]
    Panicked,
}

impl From<DoneReason> for ProbeError {
    fn from(reason: DoneReason) -> Self {
        match reason {
            DoneReason::Cancelled => ProbeError::Cancelled,
            DoneReason::DeadlineExceeded => ProbeError::DeadlineExceeded,
        }
    }
}

/// Determines whether one dependency is alive.
///
/// Implementations must return promptly once `ctx` is done.
#[async_trait::async_trait]
pub trait DependencyProbe: Send + Sync {
    async fn check(&self, ctx: &ProbeContext) -> std::result::Result<(), ProbeError>;

    fn kind(&self) -> &'static str {
        "custom"
    }
}

/// Reports this process itself. Fails once shutdown has begun so a draining
/// instance stops advertising itself as healthy.
#[derive(Debug, Clone, Default)]
pub struct SelfProbe {
    shutdown: CancellationToken,
}

impl SelfProbe {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self { shutdown }
    }
}

#[async_trait::async_trait]
impl DependencyProbe for SelfProbe {
    async fn check(&self, _ctx: &ProbeContext) -> std::result::Result<(), ProbeError> {
        if self.shutdown.is_cancelled() {
            return Err(ProbeError::Failed("service is shutting down".to_string()));
        }
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "self"
    }
}

pub enum Probe {
    Local(SelfProbe),
    Http(HttpProbe),
    Grpc(GrpcProbe),
}

impl Probe {
    pub fn from_config(dependency: &DependencyConfig) -> Result<Self> {
        match dependency.kind {
            DependencyKind::Http => Ok(Probe::Http(HttpProbe::new(&dependency.url)?)),
            DependencyKind::Grpc => Ok(Probe::Grpc(GrpcProbe::new(
                &dependency.url,
                dependency.service.clone().unwrap_or_default(),
            )?)),
        }
    }
}

#[async_trait::async_trait]
impl DependencyProbe for Probe {
    async fn check(&self, ctx: &ProbeContext) -> std::result::Result<(), ProbeError> {
        match self {
            Probe::Local(probe) => probe.check(ctx).await,
            Probe::Http(probe) => probe.check(ctx).await,
            Probe::Grpc(probe) => probe.check(ctx).await,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Probe::Local(probe) => probe.kind(),
            Probe::Http(probe) => probe.kind(),
            Probe::Grpc(probe) => probe.kind(),
        }
    }
}

/// Flattens an error and its sources into one line, skipping causes whose
/// text is already present.
pub(crate) fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
