//! Live network usage from a time-series backend
//!
//! This module provides:
//! - [`PrometheusClient`]: rate queries against a Prometheus-compatible API
//! - [`CachedUsageSource`]: short-lived per-node reading cache
//! - [`InstanceResolver`]: node name to scrape-instance address mapping

mod cache;
mod client;

pub use cache::CachedUsageSource;
pub use client::PrometheusClient;

use crate::error::TelemetryError;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Source of a node's current network transmit rate, in bytes per second
#[async_trait]
pub trait NetUsageSource: Send + Sync {
    /// Transmit rate of `node`, whose metrics are scraped from `instance`
    async fn transmit_rate(&self, node: &str, instance: &str) -> Result<f64, TelemetryError>;
}

/// Interfaces left out of the transmit rate: loopback, bridges and virtual links
pub const DEFAULT_EXCLUDED_DEVICES: &str = "lo|veth.*|docker.*|br-.*|cni.*|flannel.*|cali.*|virbr.*";

/// Telemetry client configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Base URL of the Prometheus HTTP API
    pub endpoint: String,
    /// Node name to instance address (usually the node IP)
    pub instances: HashMap<String, String>,
    /// Range window of the rate expression
    pub window: String,
    /// Regex of network devices to ignore
    pub excluded_devices: String,
    /// Per-request timeout, also sent to the backend as query timeout
    pub request_timeout_ms: u64,
    /// Upper bound on one reading, including connection setup
    pub deadline_ms: u64,
    /// How long a successful reading is reused; zero disables caching
    pub cache_ttl_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://prometheus:9090".to_string(),
            instances: HashMap::new(),
            window: "60m".to_string(),
            excluded_devices: DEFAULT_EXCLUDED_DEVICES.to_string(),
            request_timeout_ms: 5_000,
            deadline_ms: 10_000,
            cache_ttl_ms: 5_000,
        }
    }
}

impl TelemetryConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}

/// Maps nodes to the instance label their exporter is scraped under
#[derive(Debug, Clone, Default)]
pub struct InstanceResolver {
    table: HashMap<String, String>,
}

impl InstanceResolver {
    pub fn new(table: HashMap<String, String>) -> Self {
        Self { table }
    }

    /// Configured address first, then the node's reported InternalIP
    pub fn resolve(&self, node: &Node) -> Result<String, TelemetryError> {
        let name = node.metadata.name.as_deref().unwrap_or_default();
        if let Some(address) = self.table.get(name) {
            return Ok(address.clone());
        }

        node.status
            .as_ref()
            .and_then(|s| s.addresses.as_ref())
            .and_then(|addrs| addrs.iter().find(|a| a.type_ == "InternalIP"))
            .map(|a| a.address.clone())
            .ok_or_else(|| TelemetryError::UnknownInstance(name.to_string()))
    }
}
