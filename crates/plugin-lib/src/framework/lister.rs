//! Node topology access

use crate::error::{BalanceError, BalanceResult};
use k8s_openapi::api::core::v1::Node;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Read access to the scheduler's node snapshot
pub trait NodeLister: Send + Sync {
    /// All nodes known to the cluster topology
    fn list(&self) -> BalanceResult<Vec<Arc<Node>>>;

    /// A single node by name
    fn get(&self, name: &str) -> BalanceResult<Arc<Node>>;
}

/// Name of a node object, empty when unset
pub fn node_name(node: &Node) -> &str {
    node.metadata.name.as_deref().unwrap_or_default()
}

/// Immutable in-memory node snapshot
#[derive(Debug, Clone, Default)]
pub struct SnapshotLister {
    nodes: BTreeMap<String, Arc<Node>>,
}

impl SnapshotLister {
    pub fn new(nodes: impl IntoIterator<Item = Node>) -> Self {
        let nodes = nodes
            .into_iter()
            .filter(|n| !node_name(n).is_empty())
            .map(|n| (node_name(&n).to_string(), Arc::new(n)))
            .collect();
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl NodeLister for SnapshotLister {
    fn list(&self) -> BalanceResult<Vec<Arc<Node>>> {
        Ok(self.nodes.values().cloned().collect())
    }

    fn get(&self, name: &str) -> BalanceResult<Arc<Node>> {
        self.nodes
            .get(name)
            .cloned()
            .ok_or_else(|| BalanceError::NodeLookup(name.to_string()))
    }
}
