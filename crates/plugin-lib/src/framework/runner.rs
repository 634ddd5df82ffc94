//! Minimal host-side driver for one scheduling cycle
//!
//! Runs pre-filter once, scores every candidate node concurrently over
//! shallow clones of the cycle state, and applies the plugin's score
//! normalization. Node-scoped failures only drop the failing node;
//! a cycle-scoped failure leaves no eligible nodes.

use super::{CycleState, PreFilterPlugin, ScorePlugin, Status};
use k8s_openapi::api::core::v1::Pod;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Score assigned to one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeScore {
    pub name: String,
    pub score: i64,
}

/// Result of running one scheduling cycle
#[derive(Debug, Clone, Default)]
pub struct CycleOutcome {
    /// Eligible nodes with their scores, sorted by node name
    pub scores: Vec<NodeScore>,
    /// Nodes that failed to score, with the reason
    pub failures: Vec<(String, Status)>,
    /// Set when the whole cycle was aborted
    pub aborted: Option<Status>,
}

impl CycleOutcome {
    fn aborted(status: Status) -> Self {
        Self {
            aborted: Some(status),
            ..Default::default()
        }
    }

    pub fn eligible(&self) -> usize {
        self.scores.len()
    }

    /// Highest scoring node, ties broken by name
    pub fn best(&self) -> Option<&NodeScore> {
        self.scores
            .iter()
            .max_by(|a, b| a.score.cmp(&b.score).then_with(|| b.name.cmp(&a.name)))
    }
}

/// Run pre-filter and score for `pod` against `nodes`
pub async fn score_nodes<P>(plugin: Arc<P>, pod: Arc<Pod>, nodes: Vec<String>) -> CycleOutcome
where
    P: PreFilterPlugin + ScorePlugin + 'static,
{
    let pod_name = pod.metadata.name.clone().unwrap_or_default();
    let state = CycleState::new();

    if let Err(status) = plugin.pre_filter(&state, &pod).await {
        warn!(pod = %pod_name, status = %status, "Pre-filter failed, no nodes eligible");
        return CycleOutcome::aborted(status);
    }

    let mut tasks = JoinSet::new();
    let mut names = HashMap::with_capacity(nodes.len());
    for node in nodes {
        let plugin = Arc::clone(&plugin);
        let pod = Arc::clone(&pod);
        let state = state.clone();
        let name = node.clone();
        let handle = tasks.spawn(async move {
            let result = plugin.score(&state, &pod, &node).await;
            (node, result)
        });
        names.insert(handle.id(), name);
    }

    let mut outcome = CycleOutcome::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((name, Ok(score))) => outcome.scores.push(NodeScore { name, score }),
            Ok((name, Err(status))) if status.cycle_fatal => {
                warn!(pod = %pod_name, node = %name, status = %status, "Score failed for the whole cycle");
                tasks.abort_all();
                return CycleOutcome::aborted(status);
            }
            Ok((name, Err(status))) => {
                debug!(pod = %pod_name, node = %name, status = %status, "Node not eligible");
                outcome.failures.push((name, status));
            }
            Err(e) => {
                let name = names.remove(&e.id()).unwrap_or_default();
                warn!(pod = %pod_name, node = %name, error = %e, "Score task did not complete");
                outcome.failures.push((name, Status::error(e.to_string())));
            }
        }
    }

    outcome.scores.sort_by(|a, b| a.name.cmp(&b.name));
    if let Err(status) = plugin.normalize_scores(&mut outcome.scores) {
        warn!(pod = %pod_name, status = %status, "Score normalization failed");
        return CycleOutcome::aborted(status);
    }

    outcome
}
