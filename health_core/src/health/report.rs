//! Per-dependency outcomes and the aggregated health report

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Identifies one registered dependency, unique within an aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyName(String);

impl DependencyName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DependencyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DependencyName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DependencyName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for DependencyName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HealthStatus {
    #[serde(rename = "OK")]
    Healthy,
    #[serde(rename = "UNHEALTHY")]
    Unhealthy,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// The result of running one probe once.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub name: DependencyName,
    pub healthy: bool,
    pub detail: Option<String>,
    pub elapsed: Duration,
}

impl ProbeOutcome {
    pub fn healthy(name: DependencyName, elapsed: Duration) -> Self {
        Self {
            name,
            healthy: true,
            detail: None,
            elapsed,
        }
    }

    pub fn unhealthy(name: DependencyName, detail: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            name,
            healthy: false,
            detail: Some(detail.into()),
            elapsed,
        }
    }

    pub fn status(&self) -> HealthStatus {
        if self.healthy {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        }
    }

    pub fn to_entry(&self) -> HealthEntry {
        HealthEntry {
            service: self.name.to_string(),
            status: self.status(),
            message: self.detail.clone(),
        }
    }
}

/// Wire shape of one outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthEntry {
    pub service: String,
    pub status: HealthStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Outcomes in registration order plus the derived verdict.
///
/// Serializes as the JSON array of [`HealthEntry`] values; the verdict is
/// conveyed by the HTTP status code.
#[derive(Debug, Clone)]
pub struct HealthReport {
    outcomes: Vec<ProbeOutcome>,
    overall: HealthStatus,
}

impl HealthReport {
    pub fn from_outcomes(outcomes: Vec<ProbeOutcome>) -> Self {
        let overall = if outcomes.iter().all(|outcome| outcome.healthy) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };
        Self { outcomes, overall }
    }

    pub fn overall(&self) -> HealthStatus {
        self.overall
    }

    pub fn is_healthy(&self) -> bool {
        self.overall == HealthStatus::Healthy
    }

    pub fn outcomes(&self) -> &[ProbeOutcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ProbeOutcome> {
        self.outcomes.iter().find(|outcome| outcome.name.as_str() == name)
    }

    pub fn unhealthy(&self) -> impl Iterator<Item = &ProbeOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.healthy)
    }

    pub fn entries(&self) -> Vec<HealthEntry> {
        self.outcomes.iter().map(ProbeOutcome::to_entry).collect()
    }

    /// One-line description, e.g. `2 of 3 dependencies unhealthy: a, b`.
    pub fn summary(&self) -> String {
        let failing: Vec<&str> = self.unhealthy().map(|outcome| outcome.name.as_str()).collect();
        if failing.is_empty() {
            format!("all {} dependencies healthy", self.len())
        } else {
            format!(
                "{} of {} dependencies unhealthy: {}",
                failing.len(),
                self.len(),
                failing.join(", ")
            )
        }
    }
}

impl Serialize for HealthReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.outcomes.iter().map(ProbeOutcome::to_entry))
    }
}
