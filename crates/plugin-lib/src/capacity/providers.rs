//! Network capacity sources

use super::NetCapacityProvider;
use crate::error::BalanceResult;
use crate::framework::node_name;
use k8s_openapi::api::core::v1::Node;
use std::collections::HashMap;
use tracing::warn;

/// Capacity from a static per-node table with an optional fallback value
#[derive(Debug, Clone, Default)]
pub struct StaticCapacityProvider {
    per_node: HashMap<String, f64>,
    default: Option<f64>,
}

impl StaticCapacityProvider {
    pub fn new(per_node: HashMap<String, f64>, default: Option<f64>) -> Self {
        Self { per_node, default }
    }

    /// Every node gets the same capacity
    pub fn uniform(capacity: f64) -> Self {
        Self::new(HashMap::new(), Some(capacity))
    }
}

impl NetCapacityProvider for StaticCapacityProvider {
    fn name(&self) -> &str {
        "static"
    }

    fn capacity(&self, node: &Node) -> BalanceResult<Option<f64>> {
        Ok(self.per_node.get(node_name(node)).copied().or(self.default))
    }
}

/// Capacity declared on the node object itself, as a label or annotation
#[derive(Debug, Clone)]
pub struct LabelCapacityProvider {
    key: String,
}

impl LabelCapacityProvider {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl NetCapacityProvider for LabelCapacityProvider {
    fn name(&self) -> &str {
        "label"
    }

    fn capacity(&self, node: &Node) -> BalanceResult<Option<f64>> {
        let meta = &node.metadata;
        let raw = meta
            .annotations
            .as_ref()
            .and_then(|a| a.get(&self.key))
            .or_else(|| meta.labels.as_ref().and_then(|l| l.get(&self.key)));

        let Some(raw) = raw else {
            return Ok(None);
        };
        match raw.trim().parse::<f64>() {
            Ok(capacity) if capacity.is_finite() && capacity >= 0.0 => Ok(Some(capacity)),
            // An unusable declaration defers to the next provider
            _ => {
                warn!(
                    node = %node_name(node),
                    key = %self.key,
                    value = %raw,
                    "Ignoring unusable network capacity declaration"
                );
                Ok(None)
            }
        }
    }
}

/// Tries each provider in order and takes the first answer
#[derive(Default)]
pub struct ChainedCapacityProvider {
    providers: Vec<Box<dyn NetCapacityProvider>>,
}

impl ChainedCapacityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: impl NetCapacityProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }
}

impl NetCapacityProvider for ChainedCapacityProvider {
    fn name(&self) -> &str {
        "chained"
    }

    fn capacity(&self, node: &Node) -> BalanceResult<Option<f64>> {
        for provider in &self.providers {
            if let Some(capacity) = provider.capacity(node)? {
                return Ok(Some(capacity));
            }
        }
        Ok(None)
    }
}
