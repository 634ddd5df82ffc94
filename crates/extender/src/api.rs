//! HTTP API: scheduler extender prioritize verb, health checks and Prometheus metrics

use anyhow::Context;
use axum::{
    extract::State,
    http::{header, StatusCode},
    routing::{get, post},
    Json, Router,
};
use k8s_openapi::api::core::v1::{Node, Pod};
use plugin_lib::balance::MAX_NODE_SCORE;
use plugin_lib::framework::{node_name, score_nodes, SnapshotLister};
use plugin_lib::health::{DependencyStatus, HealthRegistry, HealthReport, Readiness};
use plugin_lib::BalanceNetPlugin;
use prometheus::{TextEncoder, TEXT_FORMAT};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Highest priority an extender may report
pub const MAX_EXTENDER_PRIORITY: i64 = 10;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub plugin: BalanceNetPlugin,
    pub health_registry: HealthRegistry,
}

impl AppState {
    pub fn new(plugin: BalanceNetPlugin, health_registry: HealthRegistry) -> Self {
        Self {
            plugin,
            health_registry,
        }
    }
}

/// Node objects sent by the scheduler
#[derive(Debug, Default, Deserialize)]
pub struct NodeItems {
    #[serde(default)]
    pub items: Vec<Node>,
}

/// Body of an extender prioritize call
#[derive(Debug, Deserialize)]
pub struct ExtenderArgs {
    pub pod: Pod,
    #[serde(default)]
    pub nodes: Option<NodeItems>,
    #[serde(default, rename = "nodenames")]
    pub node_names: Option<Vec<String>>,
}

/// Priority of one host in the prioritize response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostPriority {
    pub host: String,
    pub score: i64,
}

/// Map a node score onto the extender priority range
pub fn to_extender_priority(score: i64) -> i64 {
    (score.saturating_mul(MAX_EXTENDER_PRIORITY) / MAX_NODE_SCORE).clamp(0, MAX_EXTENDER_PRIORITY)
}

/// Score every candidate node for the pod; nodes that fail to score are omitted
async fn prioritize(
    State(state): State<Arc<AppState>>,
    Json(args): Json<ExtenderArgs>,
) -> Json<Vec<HostPriority>> {
    let nodes = args.nodes.unwrap_or_default().items;
    let candidates: Vec<String> = match args.node_names {
        Some(names) => names,
        None => nodes.iter().map(|n| node_name(n).to_string()).collect(),
    };
    if nodes.is_empty() && !candidates.is_empty() {
        warn!(candidates = candidates.len(), "Prioritize called without node objects");
    }

    let pod_name = args.pod.metadata.name.clone().unwrap_or_default();
    let plugin = Arc::new(state.plugin.with_lister(Arc::new(SnapshotLister::new(nodes))));
    let outcome = score_nodes(plugin, Arc::new(args.pod), candidates).await;

    if let Some(status) = &outcome.aborted {
        warn!(pod = %pod_name, status = %status, "Scheduling cycle aborted");
    }
    info!(
        pod = %pod_name,
        eligible = outcome.eligible(),
        failed = outcome.failures.len(),
        "Prioritized nodes"
    );

    Json(
        outcome
            .scores
            .into_iter()
            .map(|s| HostPriority {
                host: s.name,
                score: to_extender_priority(s.score),
            })
            .collect(),
    )
}

/// 503 only once a dependency is unhealthy; degraded still serves
async fn healthz(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthReport>) {
    let report = state.health_registry.report();
    let code = match report.status {
        DependencyStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        DependencyStatus::Healthy | DependencyStatus::Degraded => StatusCode::OK,
    };
    (code, Json(report))
}

async fn readyz(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Readiness>) {
    let readiness = state.health_registry.readiness();
    let code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(readiness))
}

/// Process-wide registry in the Prometheus text format
async fn metrics() -> Result<([(header::HeaderName, &'static str); 1], String), (StatusCode, String)> {
    TextEncoder::new()
        .encode_to_string(&prometheus::gather())
        .map(|text| ([(header::CONTENT_TYPE, TEXT_FORMAT)], text))
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/prioritize", post(prioritize))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind extender port {}", port))?;
    info!(addr = %listener.local_addr()?, "Extender API listening");

    axum::serve(listener, create_router(state))
        .await
        .context("Extender API server failed")
}
