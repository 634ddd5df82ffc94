//! Pre-filter: network capacity snapshot

use super::{BalanceNetPlugin, NET_CAPACITY_KEY};
use crate::capacity::build_snapshot;
use crate::error::BalanceResult;
use crate::framework::{CycleState, PluginResult, PreFilterPlugin, Status};
use crate::health::dependencies;
use crate::models::NodeCapacitySnapshot;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use std::sync::Arc;
use tracing::debug;

impl BalanceNetPlugin {
    /// Return the cycle's capacity snapshot, building it on first use
    pub fn ensure_capacity_snapshot(
        &self,
        state: &CycleState,
        pod: &Pod,
    ) -> BalanceResult<Arc<NodeCapacitySnapshot>> {
        if let Ok(existing) = state.read(&NET_CAPACITY_KEY) {
            debug!(nodes = existing.len(), "Capacity snapshot already present");
            return Ok(existing);
        }

        let nodes = self.lister.list()?;
        let snapshot = build_snapshot(&nodes, self.capacity.as_ref())?;

        let pod_name = pod.metadata.name.as_deref().unwrap_or_default();
        self.logger.log_snapshot_built(pod_name, snapshot.len());
        self.metrics.inc_snapshots_built();

        state.write_if_absent(&NET_CAPACITY_KEY, snapshot)
    }
}

#[async_trait]
impl PreFilterPlugin for BalanceNetPlugin {
    async fn pre_filter(&self, state: &CycleState, pod: &Pod) -> PluginResult<()> {
        match self.ensure_capacity_snapshot(state, pod) {
            Ok(_) => {
                self.health.record_success(dependencies::CAPACITY);
                Ok(())
            }
            Err(e) => {
                self.health
                    .record_failure(dependencies::CAPACITY, e.to_string());
                Err(Status::from(e))
            }
        }
    }
}
