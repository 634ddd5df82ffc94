//! Per-node network capacity
//!
//! Capacity is resolved through a [`NetCapacityProvider`] when the
//! pre-filter phase builds the cycle's [`NodeCapacitySnapshot`].

mod providers;

pub use providers::{ChainedCapacityProvider, LabelCapacityProvider, StaticCapacityProvider};

use crate::error::{BalanceError, BalanceResult};
use crate::framework::node_name;
use crate::models::NodeCapacitySnapshot;
use k8s_openapi::api::core::v1::Node;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Placeholder capacity used when nothing better is configured
pub const DEFAULT_NET_CAPACITY: f64 = 50.0;

/// Label or annotation holding a node's declared network capacity
pub const DEFAULT_CAPACITY_KEY: &str = "netbalance.io/net-capacity";

/// Source of a node's total network throughput budget
pub trait NetCapacityProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Capacity of `node`, or `None` when this provider has no opinion
    fn capacity(&self, node: &Node) -> BalanceResult<Option<f64>>;
}

/// Capacity provider configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CapacityConfig {
    /// Capacity for nodes without a more specific value
    pub default: Option<f64>,
    /// Explicit capacity per node name
    pub per_node: HashMap<String, f64>,
    /// Node label/annotation consulted before the static table
    pub key: Option<String>,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            default: Some(DEFAULT_NET_CAPACITY),
            per_node: HashMap::new(),
            key: Some(DEFAULT_CAPACITY_KEY.to_string()),
        }
    }
}

impl CapacityConfig {
    /// Build the provider chain: node label first, then the static table
    pub fn build_provider(&self) -> Arc<dyn NetCapacityProvider> {
        let mut chain = ChainedCapacityProvider::new();
        if let Some(key) = &self.key {
            chain = chain.with(LabelCapacityProvider::new(key.clone()));
        }
        Arc::new(chain.with(StaticCapacityProvider::new(
            self.per_node.clone(),
            self.default,
        )))
    }
}

/// Resolve the capacity of every node; any node without a usable value fails the build
pub fn build_snapshot(
    nodes: &[Arc<Node>],
    provider: &dyn NetCapacityProvider,
) -> BalanceResult<NodeCapacitySnapshot> {
    let mut capacities = HashMap::with_capacity(nodes.len());
    for node in nodes {
        let name = node_name(node);
        let capacity = provider
            .capacity(node)?
            .ok_or_else(|| BalanceError::Capacity {
                node: name.to_string(),
                reason: format!("provider {:?} has no value", provider.name()),
            })?;
        if !capacity.is_finite() || capacity < 0.0 {
            return Err(BalanceError::Capacity {
                node: name.to_string(),
                reason: format!("invalid capacity {}", capacity),
            });
        }
        capacities.insert(name.to_string(), capacity);
    }
    Ok(NodeCapacitySnapshot::new(capacities))
}
