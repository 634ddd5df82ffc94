//! Score: balance of residual capacity across cpu, memory and network

use super::{normalize_min_max, BalanceNetPlugin, NET_CAPACITY_KEY};
use crate::balance::{balance_score, ScoreBreakdown, MAX_NODE_SCORE};
use crate::error::{BalanceError, BalanceResult};
use crate::framework::{CycleState, NodeScore, PluginResult, ScorePlugin, Status};
use crate::health::dependencies;
use crate::models::{DimensionState, NodeResourceState};
use crate::quantity::resource_value;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use std::time::Instant;

impl BalanceNetPlugin {
    /// Gather the node's resource state and compute its balance score
    pub async fn score_breakdown(
        &self,
        state: &CycleState,
        pod: &Pod,
        node_name: &str,
    ) -> BalanceResult<ScoreBreakdown> {
        let snapshot = state.read(&NET_CAPACITY_KEY)?;
        let node = self.lister.get(node_name)?;
        let net_capacity = snapshot
            .get(node_name)
            .ok_or_else(|| BalanceError::NodeLookup(node_name.to_string()))?;

        let request = self.config.request.aggregate(pod)?;

        let status = node.status.as_ref();
        let capacity = status.and_then(|s| s.capacity.as_ref());
        let allocatable = status.and_then(|s| s.allocatable.as_ref());
        let cpu_capacity = resource_value(capacity, "cpu");
        let memory_capacity = resource_value(capacity, "memory");
        let cpu_used = cpu_capacity - resource_value(allocatable, "cpu");
        let memory_used = memory_capacity - resource_value(allocatable, "memory");

        let net_used = self.net_usage(&node, node_name).await?;

        let resources = NodeResourceState {
            cpu: DimensionState::new(cpu_capacity, cpu_used, request.cpu),
            memory: DimensionState::new(memory_capacity, memory_used, request.memory),
            net: DimensionState::new(net_capacity, net_used, request.net),
        };
        balance_score(node_name, &resources, &self.config.weights)
    }

    async fn net_usage(&self, node: &Node, node_name: &str) -> BalanceResult<f64> {
        let telemetry_error = |source| BalanceError::Telemetry {
            node: node_name.to_string(),
            source,
        };

        let instance = self.resolver.resolve(node).map_err(telemetry_error)?;
        match self.usage.transmit_rate(node_name, &instance).await {
            Ok(rate) => {
                self.health.record_success(dependencies::TELEMETRY);
                Ok(rate)
            }
            Err(e) => {
                self.logger
                    .log_telemetry_failure(node_name, &instance, &e.to_string());
                self.health
                    .record_failure(dependencies::TELEMETRY, e.to_string());
                Err(telemetry_error(e))
            }
        }
    }
}

#[async_trait]
impl ScorePlugin for BalanceNetPlugin {
    async fn score(&self, state: &CycleState, pod: &Pod, node_name: &str) -> PluginResult<i64> {
        let start = Instant::now();
        let pod_name = pod.metadata.name.as_deref().unwrap_or_default();

        let result = self.score_breakdown(state, pod, node_name).await;
        self.metrics
            .observe_score_latency(start.elapsed().as_secs_f64());

        match result {
            Ok(breakdown) => {
                let score = breakdown.to_node_score(self.config.score_scale);
                self.metrics.inc_nodes_scored();
                self.logger.log_node_scored(
                    pod_name,
                    node_name,
                    breakdown.residual,
                    breakdown.imbalance,
                    score,
                );
                Ok(score)
            }
            Err(e) => {
                self.metrics.inc_score_failures(e.kind());
                self.logger
                    .log_node_score_failed(pod_name, node_name, e.kind(), &e.to_string());
                Err(Status::from(e))
            }
        }
    }

    fn normalize_scores(&self, scores: &mut [NodeScore]) -> PluginResult<()> {
        if self.config.normalize {
            normalize_min_max(scores, MAX_NODE_SCORE)?;
        }
        Ok(())
    }
}
