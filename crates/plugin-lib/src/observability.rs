//! Observability infrastructure for the scoring plugin
//!
//! Provides:
//! - Prometheus metrics (score latency, telemetry latency and errors, cache hits)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<SchedulerMetricsInner> = OnceLock::new();

struct SchedulerMetricsInner {
    score_latency_seconds: Histogram,
    telemetry_latency_seconds: Histogram,
    telemetry_errors: IntCounter,
    telemetry_cache_hits: IntCounter,
    telemetry_cache_misses: IntCounter,
    score_failures: IntCounterVec,
    nodes_scored: IntCounter,
    snapshots_built: IntCounter,
}

impl SchedulerMetricsInner {
    fn new() -> Self {
        Self {
            score_latency_seconds: register_histogram!(
                "netbalance_score_latency_seconds",
                "Time spent scoring one node",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register score_latency_seconds"),

            telemetry_latency_seconds: register_histogram!(
                "netbalance_telemetry_latency_seconds",
                "Time spent querying the metrics backend for one node",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register telemetry_latency_seconds"),

            telemetry_errors: register_int_counter!(
                "netbalance_telemetry_errors_total",
                "Failed network usage queries"
            )
            .expect("Failed to register telemetry_errors"),

            telemetry_cache_hits: register_int_counter!(
                "netbalance_telemetry_cache_hits_total",
                "Network usage readings served from cache"
            )
            .expect("Failed to register telemetry_cache_hits"),

            telemetry_cache_misses: register_int_counter!(
                "netbalance_telemetry_cache_misses_total",
                "Network usage readings fetched from the backend"
            )
            .expect("Failed to register telemetry_cache_misses"),

            score_failures: register_int_counter_vec!(
                "netbalance_score_failures_total",
                "Node scores that ended in an error, by error kind",
                &["kind"]
            )
            .expect("Failed to register score_failures"),

            nodes_scored: register_int_counter!(
                "netbalance_nodes_scored_total",
                "Nodes scored successfully"
            )
            .expect("Failed to register nodes_scored"),

            snapshots_built: register_int_counter!(
                "netbalance_capacity_snapshots_built_total",
                "Network capacity snapshots built by pre-filter"
            )
            .expect("Failed to register snapshots_built"),
        }
    }
}

/// Handle to the process-wide scheduler metrics.
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct SchedulerMetrics {
    _private: (),
}

impl Default for SchedulerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(SchedulerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &SchedulerMetricsInner {
        GLOBAL_METRICS.get_or_init(SchedulerMetricsInner::new)
    }

    pub fn observe_score_latency(&self, duration_secs: f64) {
        self.inner().score_latency_seconds.observe(duration_secs);
    }

    pub fn observe_telemetry_latency(&self, duration_secs: f64) {
        self.inner().telemetry_latency_seconds.observe(duration_secs);
    }

    pub fn inc_telemetry_errors(&self) {
        self.inner().telemetry_errors.inc();
    }

    pub fn inc_telemetry_cache_hits(&self) {
        self.inner().telemetry_cache_hits.inc();
    }

    pub fn inc_telemetry_cache_misses(&self) {
        self.inner().telemetry_cache_misses.inc();
    }

    pub fn inc_score_failures(&self, kind: &str) {
        self.inner().score_failures.with_label_values(&[kind]).inc();
    }

    pub fn inc_nodes_scored(&self) {
        self.inner().nodes_scored.inc();
    }

    pub fn inc_snapshots_built(&self) {
        self.inner().snapshots_built.inc();
    }
}

/// Structured logger for scheduling events
#[derive(Clone)]
pub struct StructuredLogger {
    plugin: String,
}

impl StructuredLogger {
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
        }
    }

    /// Log a freshly built capacity snapshot
    pub fn log_snapshot_built(&self, pod: &str, nodes: usize) {
        info!(
            event = "snapshot_built",
            plugin = %self.plugin,
            pod = %pod,
            nodes = nodes,
            "Built network capacity snapshot"
        );
    }

    /// Log a successful node score with its components
    pub fn log_node_scored(
        &self,
        pod: &str,
        node: &str,
        residual: f64,
        imbalance: f64,
        score: i64,
    ) {
        debug!(
            event = "node_scored",
            plugin = %self.plugin,
            pod = %pod,
            node = %node,
            residual = residual,
            imbalance = imbalance,
            score = score,
            "Scored node"
        );
    }

    /// Log a node that could not be scored
    pub fn log_node_score_failed(&self, pod: &str, node: &str, kind: &str, error: &str) {
        warn!(
            event = "node_score_failed",
            plugin = %self.plugin,
            pod = %pod,
            node = %node,
            kind = %kind,
            error = %error,
            "Node not scorable"
        );
    }

    /// Log a failed network usage query
    pub fn log_telemetry_failure(&self, node: &str, instance: &str, error: &str) {
        warn!(
            event = "telemetry_failed",
            plugin = %self.plugin,
            node = %node,
            instance = %instance,
            error = %error,
            "Network usage query failed"
        );
    }

    pub fn log_startup(&self, version: &str, endpoint: &str) {
        info!(
            event = "extender_started",
            plugin = %self.plugin,
            version = %version,
            metrics_endpoint = %endpoint,
            "Scheduler extender started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "extender_shutdown",
            plugin = %self.plugin,
            reason = %reason,
            "Scheduler extender shutting down"
        );
    }
}
