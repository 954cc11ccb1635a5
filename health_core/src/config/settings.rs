use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub service: ServiceConfig,
    pub health: HealthConfig,
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub version: String,
    pub environment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Upper bound for one aggregated health check.
    pub timeout_ms: u64,
    /// Name under which this process reports itself.
    pub self_name: String,
    /// Comma-separated HTTP health URLs, each reported under its own URL.
    pub urls: String,
    pub dependencies: Vec<DependencyConfig>,
    /// Treat an empty external dependency list as a misconfiguration.
    pub require_dependencies: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Http,
    Grpc,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencyConfig {
    pub name: String,
    pub kind: DependencyKind,
    /// Full health URL for `http`, channel target for `grpc`.
    pub url: String,
    /// Service name sent in the gRPC health request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            shutdown_timeout_seconds: 10,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "health-api".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            self_name: "self".to_string(),
            urls: String::new(),
            dependencies: Vec::new(),
            require_dependencies: false,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_seconds: 30,
        }
    }
}

impl DependencyConfig {
    pub fn http(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DependencyKind::Http,
            url: url.into(),
            service: None,
        }
    }

    pub fn grpc(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DependencyKind::Grpc,
            url: target.into(),
            service: None,
        }
    }
}

impl HealthConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Structured dependencies first, then one HTTP dependency per entry of
    /// `urls`, skipping empty items.
    pub fn dependencies(&self) -> Vec<DependencyConfig> {
        let from_urls = self
            .urls
            .split(',')
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(|url| DependencyConfig::http(url, url));

        self.dependencies.iter().cloned().chain(from_urls).collect()
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

impl AppConfig {
    /// Loads from the working directory for the environment named by
    /// `RUST_ENV` (default `development`).
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string());
        Self::load_from(Path::new("."), &env)
    }

    /// Defaults, then `config.toml`, then `config.<env>.toml`, then `APP_*`
    /// environment variables (`__` separates nested keys).
    pub fn load_from(dir: &Path, env: &str) -> Result<Self, ConfigError> {
        let mut defaults = AppConfig::default();
        defaults.service.environment = env.to_string();

        let mut builder = Config::builder().add_source(Config::try_from(&defaults)?);

        let base = dir.join("config.toml");
        if base.exists() {
            builder = builder.add_source(File::from(base));
        }

        let overlay = dir.join(format!("config.{}.toml", env));
        if overlay.exists() {
            builder = builder.add_source(File::from(overlay));
        }

        builder = builder.add_source(
            Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        app_config.validate()?;

        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port cannot be 0".to_string()));
        }

        if self.health.timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Health check timeout must be greater than 0".to_string(),
            ));
        }

        if self.health.self_name.trim().is_empty() {
            return Err(ConfigError::Message(
                "Self dependency name cannot be empty".to_string(),
            ));
        }

        let dependencies = self.health.dependencies();

        if dependencies.is_empty() && self.health.require_dependencies {
            return Err(ConfigError::Message(
                "No dependencies configured but health.require_dependencies is set".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        seen.insert(self.health.self_name.as_str());
        for dependency in &dependencies {
            if dependency.name.trim().is_empty() {
                return Err(ConfigError::Message(
                    "Dependency name cannot be empty".to_string(),
                ));
            }
            if dependency.url.trim().is_empty() {
                return Err(ConfigError::Message(format!(
                    "Dependency '{}' has an empty URL",
                    dependency.name
                )));
            }
            if !seen.insert(dependency.name.as_str()) {
                return Err(ConfigError::Message(format!(
                    "Dependency '{}' is configured more than once",
                    dependency.name
                )));
            }
        }

        if self.monitor.enabled && self.monitor.interval_seconds == 0 {
            return Err(ConfigError::Message(
                "Monitor interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
