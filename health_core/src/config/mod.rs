pub mod settings;

pub use settings::{
    AppConfig, DependencyConfig, DependencyKind, HealthConfig, MonitorConfig, ServerConfig,
    ServiceConfig,
};
