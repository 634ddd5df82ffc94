//! Network-aware balance scoring for a workload placement scheduler
//!
//! This crate provides the core functionality for:
//! - A typed per-cycle state store and the scheduling plugin contract
//! - Per-node network capacity snapshots built at pre-filter time
//! - Balance scoring across cpu, memory and network
//! - Live network usage from a Prometheus-compatible backend
//! - Health checks and observability

pub mod balance;
pub mod capacity;
pub mod error;
pub mod framework;
pub mod health;
pub mod models;
pub mod observability;
pub mod plugin;
pub mod quantity;
pub mod telemetry;

pub use error::{BalanceError, BalanceResult, ErrorScope, TelemetryError};
pub use health::{DependencyHealth, DependencyStatus, HealthRegistry, HealthReport, Readiness};
pub use models::*;
pub use observability::{SchedulerMetrics, StructuredLogger};
pub use plugin::{BalanceNetPlugin, PluginConfig, PLUGIN_NAME};
