//! gRPC dependency probe speaking the standard `grpc.health.v1` protocol

use super::context::ProbeContext;
use super::probe::{error_chain, DependencyProbe, ProbeError};
use crate::error::{AppError, Result};
use tokio::sync::OnceCell;
use tonic::transport::{Channel, Endpoint};
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;

pub struct GrpcProbe {
    endpoint: Endpoint,
    service: String,
    channel: OnceCell<Channel>,
}

impl GrpcProbe {
    /// `service` is the name passed in `HealthCheckRequest`; empty asks
    /// about the server as a whole.
    pub fn new(target: &str, service: impl Into<String>) -> Result<Self> {
        let endpoint = Endpoint::from_shared(target.to_string())
            .map_err(|e| AppError::Configuration(format!("invalid gRPC target '{}': {}", target, e)))?;
        Ok(Self {
            endpoint,
            service: service.into(),
            channel: OnceCell::new(),
        })
    }

    /// The channel is dialled on the first check and reused afterwards.
    async fn channel(&self) -> std::result::Result<Channel, ProbeError> {
        self.channel
            .get_or_try_init(|| self.endpoint.connect())
            .await
            .cloned()
            .map_err(|e| ProbeError::Rpc(error_chain(&e)))
    }
}

#[async_trait::async_trait]
impl DependencyProbe for GrpcProbe {
    async fn check(&self, ctx: &ProbeContext) -> std::result::Result<(), ProbeError> {
        if let Some(reason) = ctx.err() {
            return Err(reason.into());
        }

        let channel = tokio::select! {
            connected = self.channel() => connected?,
            reason = ctx.done() => return Err(reason.into()),
        };

        let mut client = HealthClient::new(channel);
        let mut request = tonic::Request::new(HealthCheckRequest {
            service: self.service.clone(),
        });
        if let Some(remaining) = ctx.remaining() {
            request.set_timeout(remaining);
        }

        let response = tokio::select! {
            called = client.check(request) => called.map_err(|status| {
                ProbeError::Rpc(format!("{:?}: {}", status.code(), status.message()))
            })?,
            reason = ctx.done() => return Err(reason.into()),
        };

        match response.into_inner().status() {
            ServingStatus::Serving => Ok(()),
            other => Err(ProbeError::Rpc(format!("service reported {}", other.as_str_name()))),
        }
    }

    fn kind(&self) -> &'static str {
        "grpc"
    }
}
