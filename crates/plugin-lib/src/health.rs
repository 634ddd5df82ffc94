//! Health of the scoring plugin's external dependencies
//!
//! The metrics backend is the only dependency that can fail at runtime.
//! Its health follows query outcomes: a failure degrades it, repeated
//! consecutive failures mark it unhealthy, and any success restores it.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Consecutive failures after which a dependency is reported unhealthy
pub const UNHEALTHY_AFTER_FAILURES: u32 = 3;

/// Dependency names reported by the plugin
pub mod dependencies {
    pub const TELEMETRY: &str = "telemetry";
    pub const CAPACITY: &str = "capacity";
}

/// Ordered from best to worst so the overall status is the maximum
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyHealth {
    pub status: DependencyStatus,
    pub consecutive_failures: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl DependencyHealth {
    fn ok() -> Self {
        Self {
            status: DependencyStatus::Healthy,
            consecutive_failures: 0,
            last_error: None,
            updated_at: Utc::now(),
        }
    }

    fn fail(&mut self, error: String) {
        self.consecutive_failures += 1;
        self.status = if self.consecutive_failures >= UNHEALTHY_AFTER_FAILURES {
            DependencyStatus::Unhealthy
        } else {
            DependencyStatus::Degraded
        };
        self.last_error = Some(error);
        self.updated_at = Utc::now();
    }
}

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: DependencyStatus,
    pub dependencies: BTreeMap<String, DependencyHealth>,
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Readiness {
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Shared, cheaply cloned record of dependency outcomes
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    entries: Arc<DashMap<String, DependencyHealth>>,
    initialized: Arc<AtomicBool>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `name` as healthy
    pub fn register(&self, name: &str) {
        self.entries.insert(name.to_string(), DependencyHealth::ok());
    }

    pub fn record_success(&self, name: &str) {
        self.entries.insert(name.to_string(), DependencyHealth::ok());
    }

    pub fn record_failure(&self, name: &str, error: impl Into<String>) {
        self.entries
            .entry(name.to_string())
            .or_insert_with(DependencyHealth::ok)
            .fail(error.into());
    }

    /// Mark the host as done with startup
    pub fn set_ready(&self, ready: bool) {
        self.initialized.store(ready, Ordering::Release);
    }

    /// Worst status across every tracked dependency
    pub fn report(&self) -> HealthReport {
        let dependencies: BTreeMap<_, _> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let status = dependencies
            .values()
            .map(|d| d.status)
            .max()
            .unwrap_or(DependencyStatus::Healthy);
        HealthReport {
            status,
            dependencies,
        }
    }

    pub fn readiness(&self) -> Readiness {
        let reason = if !self.initialized.load(Ordering::Acquire) {
            Some("Extender not yet initialized")
        } else if self.report().status == DependencyStatus::Unhealthy {
            Some("Metrics backend unreachable")
        } else {
            None
        };
        Readiness {
            ready: reason.is_none(),
            reason: reason.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_degrade_then_fail() {
        let registry = HealthRegistry::new();
        registry.register(dependencies::TELEMETRY);
        registry.register(dependencies::CAPACITY);

        registry.record_failure(dependencies::TELEMETRY, "timeout");
        assert_eq!(registry.report().status, DependencyStatus::Degraded);

        registry.record_failure(dependencies::TELEMETRY, "timeout");
        registry.record_failure(dependencies::TELEMETRY, "timeout");
        let report = registry.report();
        assert_eq!(report.status, DependencyStatus::Unhealthy);
        assert_eq!(report.dependencies[dependencies::TELEMETRY].consecutive_failures, 3);
        assert_eq!(
            report.dependencies[dependencies::CAPACITY].status,
            DependencyStatus::Healthy
        );
    }

    #[test]
    fn test_success_resets_dependency() {
        let registry = HealthRegistry::new();
        registry.record_failure(dependencies::TELEMETRY, "refused");
        registry.record_success(dependencies::TELEMETRY);

        let report = registry.report();
        assert_eq!(report.status, DependencyStatus::Healthy);
        assert!(report.dependencies[dependencies::TELEMETRY].last_error.is_none());
    }

    #[test]
    fn test_empty_registry_is_healthy() {
        assert_eq!(HealthRegistry::new().report().status, DependencyStatus::Healthy);
    }

    #[test]
    fn test_readiness() {
        let registry = HealthRegistry::new();
        registry.register(dependencies::TELEMETRY);
        assert!(!registry.readiness().ready);

        registry.set_ready(true);
        assert!(registry.readiness().ready);

        for _ in 0..UNHEALTHY_AFTER_FAILURES {
            registry.record_failure(dependencies::TELEMETRY, "down");
        }
        let readiness = registry.readiness();
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("Metrics backend unreachable"));
    }

    #[test]
    fn test_report_serializes_lowercase_status() {
        let registry = HealthRegistry::new();
        registry.record_failure(dependencies::TELEMETRY, "timeout");
        let json = serde_json::to_value(registry.report()).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["dependencies"]["telemetry"]["last_error"], "timeout");
    }
}
