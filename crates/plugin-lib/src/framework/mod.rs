//! Scheduling framework contract consumed by the plugin
//!
//! The host scheduler owns the scheduling loop. It calls
//! [`PreFilterPlugin::pre_filter`] once per pending pod and then
//! [`ScorePlugin::score`] once per candidate node, passing the same
//! [`CycleState`] (or shallow clones of it) to every call of the cycle.

mod cycle_state;
mod lister;
mod runner;

pub use cycle_state::{CycleState, StateKey};
pub use lister::{node_name, NodeLister, SnapshotLister};
pub use runner::{score_nodes, CycleOutcome, NodeScore};

use crate::error::{BalanceError, ErrorScope};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use std::fmt;

/// Result code reported back to the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    Success,
    Error,
    Unschedulable,
}

/// Outcome of a plugin operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub code: Code,
    pub reasons: Vec<String>,
    /// Whether the failure aborts the whole cycle rather than a single node
    pub cycle_fatal: bool,
}

impl Status {
    pub fn success() -> Self {
        Self {
            code: Code::Success,
            reasons: Vec::new(),
            cycle_fatal: false,
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            code: Code::Error,
            reasons: vec![reason.into()],
            cycle_fatal: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Code::Success
    }

    pub fn message(&self) -> String {
        self.reasons.join(", ")
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message())
    }
}

impl From<BalanceError> for Status {
    fn from(err: BalanceError) -> Self {
        Self {
            code: Code::Error,
            reasons: vec![err.to_string()],
            cycle_fatal: err.scope() == ErrorScope::Cycle,
        }
    }
}

pub type PluginResult<T> = Result<T, Status>;

/// Base trait of every scheduling plugin
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;
}

/// Runs once per pending pod before any node is scored
#[async_trait]
pub trait PreFilterPlugin: Plugin {
    async fn pre_filter(&self, state: &CycleState, pod: &Pod) -> PluginResult<()>;
}

/// Runs once per (pending pod, candidate node) pair
#[async_trait]
pub trait ScorePlugin: Plugin {
    async fn score(&self, state: &CycleState, pod: &Pod, node_name: &str) -> PluginResult<i64>;

    /// Optional pass over all node scores of a cycle after scoring completes
    fn normalize_scores(&self, _scores: &mut [NodeScore]) -> PluginResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_node_error() {
        let status = Status::from(BalanceError::NodeLookup("node9".into()));
        assert_eq!(status.code, Code::Error);
        assert!(!status.cycle_fatal);
        assert!(status.message().contains("node9"));
    }

    #[test]
    fn test_status_from_cycle_error() {
        let status = Status::from(BalanceError::TopologyList("timeout".into()));
        assert!(status.cycle_fatal);
        assert!(!status.is_success());
        assert_eq!(status.to_string(), "Error: failed to list nodes: timeout");
    }
}
