//! Balance-aware network scoring plugin
//!
//! Pre-filter snapshots every node's network capacity into the cycle state;
//! score combines that snapshot with live cpu/memory allocation from the node
//! object and live network usage from the telemetry source.

mod prefilter;
mod request;
mod score;


pub use request::{NetRequestPolicy, RequestConfig, DEFAULT_NET_REQUEST_KEY};

use crate::balance::MAX_NODE_SCORE;
use crate::capacity::NetCapacityProvider;
use crate::error::{BalanceError, BalanceResult};
use crate::framework::{NodeLister, NodeScore, Plugin, PluginResult, StateKey};
use crate::health::HealthRegistry;
use crate::models::{NodeCapacitySnapshot, ResourceWeights};
use crate::observability::{SchedulerMetrics, StructuredLogger};
use crate::telemetry::{InstanceResolver, NetUsageSource};
use serde::Deserialize;
use std::sync::Arc;

/// Name the plugin is registered under
pub const PLUGIN_NAME: &str = "NetBalance";

/// Largest accepted `score_scale`
pub const MAX_SCORE_SCALE: f64 = 1e6;

/// Cycle state slot holding the network capacity snapshot
pub const NET_CAPACITY_KEY: StateKey<NodeCapacitySnapshot> = StateKey::new("NodeNetCapacityMap");

/// Scoring behaviour, fixed at plugin construction
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    pub weights: ResourceWeights,
    pub request: RequestConfig,
    /// Multiplier applied to the balance score before truncation
    pub score_scale: f64,
    /// Min-max normalize cycle scores onto `0..=MAX_NODE_SCORE`
    pub normalize: bool,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            weights: ResourceWeights::default(),
            request: RequestConfig::default(),
            score_scale: MAX_NODE_SCORE as f64,
            normalize: true,
        }
    }
}

/// The scoring plugin; cheap to clone, all collaborators are shared
#[derive(Clone)]
pub struct BalanceNetPlugin {
    config: PluginConfig,
    lister: Arc<dyn NodeLister>,
    capacity: Arc<dyn NetCapacityProvider>,
    usage: Arc<dyn NetUsageSource>,
    resolver: InstanceResolver,
    health: HealthRegistry,
    metrics: SchedulerMetrics,
    logger: StructuredLogger,
}

impl PluginConfig {
    pub fn validate(&self) -> BalanceResult<()> {
        self.weights.validate()?;
        let scale = self.score_scale;
        if !(scale.is_finite() && scale > 0.0 && scale <= MAX_SCORE_SCALE) {
            return Err(BalanceError::InvalidScoreScale {
                value: scale,
                max: MAX_SCORE_SCALE,
            });
        }
        Ok(())
    }
}

impl BalanceNetPlugin {
    pub fn new(
        config: PluginConfig,
        lister: Arc<dyn NodeLister>,
        capacity: Arc<dyn NetCapacityProvider>,
        usage: Arc<dyn NetUsageSource>,
        resolver: InstanceResolver,
    ) -> BalanceResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            lister,
            capacity,
            usage,
            resolver,
            health: HealthRegistry::new(),
            metrics: SchedulerMetrics::new(),
            logger: StructuredLogger::new(PLUGIN_NAME),
        })
    }

    /// Report dependency health into `health`
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    /// Same plugin over a different node snapshot
    pub fn with_lister(&self, lister: Arc<dyn NodeLister>) -> Self {
        Self {
            lister,
            ..self.clone()
        }
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }
}

impl Plugin for BalanceNetPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }
}

/// Min-max rescale scores onto `0..=max`; equal scores all map to `max`
pub fn normalize_min_max(scores: &mut [NodeScore], max: i64) -> PluginResult<()> {
    let Some(lowest) = scores.iter().map(|s| s.score).min() else {
        return Ok(());
    };
    let highest = scores.iter().map(|s| s.score).max().unwrap_or(lowest);
    // i128 keeps the span exact across the whole i64 range
    let span = i128::from(highest) - i128::from(lowest);

    for s in scores.iter_mut() {
        s.score = if span == 0 {
            max
        } else {
            let offset = (i128::from(s.score) - i128::from(lowest)) as f64;
            (offset * max as f64 / span as f64).round() as i64
        };
    }
    Ok(())
}
