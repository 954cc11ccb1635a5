pub mod aggregator;
pub mod context;
pub mod grpc;
pub mod http;
pub mod monitor;
pub mod probe;
pub mod report;

#[cfg(test)]
mod tests;

pub use aggregator::HealthAggregator;
pub use context::{DoneReason, ProbeContext};
pub use grpc::GrpcProbe;
pub use http::HttpProbe;
pub use monitor::HealthMonitor;
pub use probe::{DependencyProbe, Probe, ProbeError, SelfProbe};
pub use report::{DependencyName, HealthEntry, HealthReport, HealthStatus, ProbeOutcome};
