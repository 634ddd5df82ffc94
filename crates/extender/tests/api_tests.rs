//! Integration tests for the extender API endpoints

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use netbalance_extender::api::{create_router, AppState, HostPriority};
use plugin_lib::capacity::StaticCapacityProvider;
use plugin_lib::framework::SnapshotLister;
use plugin_lib::health::{dependencies, DependencyStatus, HealthRegistry};
use plugin_lib::telemetry::{InstanceResolver, NetUsageSource};
use plugin_lib::{BalanceNetPlugin, PluginConfig, TelemetryError};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Fixed transmit rates; unknown nodes time out
struct FixedUsage(HashMap<&'static str, f64>);

#[async_trait]
impl NetUsageSource for FixedUsage {
    async fn transmit_rate(&self, node: &str, _instance: &str) -> Result<f64, TelemetryError> {
        self.0
            .get(node)
            .copied()
            .ok_or(TelemetryError::Timeout(Duration::from_secs(10)))
    }
}

async fn setup_test_app(rates: &[(&'static str, f64)]) -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(dependencies::TELEMETRY);
    health_registry.register(dependencies::CAPACITY);

    let plugin = BalanceNetPlugin::new(
        PluginConfig::default(),
        Arc::new(SnapshotLister::default()),
        Arc::new(StaticCapacityProvider::uniform(50.0)),
        Arc::new(FixedUsage(rates.iter().copied().collect())),
        InstanceResolver::default(),
    )
    .unwrap()
    .with_health(health_registry.clone());

    let state = Arc::new(AppState::new(plugin, health_registry));
    (create_router(state.clone()), state)
}

fn node_json(name: &str, allocatable_cpu: &str, allocatable_memory: &str) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Node",
        "metadata": { "name": name },
        "status": {
            "capacity": { "cpu": "4", "memory": "8Gi" },
            "allocatable": { "cpu": allocatable_cpu, "memory": allocatable_memory },
            "addresses": [ { "type": "InternalIP", "address": "10.0.0.1" } ]
        }
    })
}

fn pod_json(net_request: Option<&str>) -> Value {
    let mut pod = json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": { "name": "web-0", "namespace": "default" },
        "spec": {
            "containers": [{
                "name": "web",
                "resources": { "requests": { "cpu": "500m", "memory": "512Mi" } }
            }]
        }
    });
    if let Some(net) = net_request {
        pod["metadata"]["annotations"] = json!({ "netRequest": net });
    }
    pod
}

async fn prioritize(app: Router, body: Value) -> (StatusCode, Vec<HostPriority>) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/prioritize")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_prioritize_prefers_uniformly_loaded_node() {
    let (app, _state) = setup_test_app(&[("node-x", 5.0), ("node-y", 20.0)]).await;

    let body = json!({
        "pod": pod_json(Some("2")),
        "nodes": { "items": [
            node_json("node-x", "400m", "7.2Gi"),
            node_json("node-y", "2400m", "4.8Gi")
        ]}
    });
    let (status, priorities) = prioritize(app, body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        priorities,
        vec![
            HostPriority {
                host: "node-x".to_string(),
                score: 0
            },
            HostPriority {
                host: "node-y".to_string(),
                score: 10
            },
        ]
    );
}

#[tokio::test]
async fn test_prioritize_omits_nodes_with_failed_telemetry() {
    let (app, _state) = setup_test_app(&[("node1", 0.0)]).await;

    let body = json!({
        "pod": pod_json(Some("2")),
        "nodes": { "items": [
            node_json("node1", "4", "8Gi"),
            node_json("node2", "4", "8Gi")
        ]},
        "nodenames": ["node1", "node2"]
    });
    let (status, priorities) = prioritize(app, body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        priorities,
        vec![HostPriority {
            host: "node1".to_string(),
            score: 10
        }]
    );
}

#[tokio::test]
async fn test_telemetry_outage_degrades_health() {
    let (app, state) = setup_test_app(&[]).await;

    let body = json!({
        "pod": pod_json(Some("2")),
        "nodes": { "items": [ node_json("node1", "4", "8Gi") ] }
    });
    let (status, priorities) = prioritize(app, body).await;

    assert_eq!(status, StatusCode::OK);
    assert!(priorities.is_empty());

    let report = state.health_registry.report();
    let telemetry = &report.dependencies[dependencies::TELEMETRY];
    assert_eq!(telemetry.consecutive_failures, 1);
    assert_eq!(telemetry.status, DependencyStatus::Degraded);
}

#[tokio::test]
async fn test_prioritize_without_network_request_returns_no_hosts() {
    let (app, _state) = setup_test_app(&[("node1", 0.0), ("node2", 0.0)]).await;

    let body = json!({
        "pod": pod_json(None),
        "nodes": { "items": [
            node_json("node1", "4", "8Gi"),
            node_json("node2", "4", "8Gi")
        ]}
    });
    let (status, priorities) = prioritize(app, body).await;

    assert_eq!(status, StatusCode::OK);
    assert!(priorities.is_empty());
}

#[tokio::test]
async fn test_prioritize_rejects_malformed_body() {
    let (app, _state) = setup_test_app(&[]).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/prioritize")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"nodes": []}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_healthz_reports_degraded_telemetry() {
    let (app, state) = setup_test_app(&[]).await;
    state
        .health_registry
        .record_failure(dependencies::TELEMETRY, "timeout");

    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "degraded");
}

#[tokio::test]
async fn test_readyz_depends_on_initialization() {
    let (app, state) = setup_test_app(&[]).await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    state.health_registry.set_ready(true);
    let response = app
        .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_scoring_metrics() {
    let (app, _state) = setup_test_app(&[("node1", 0.0)]).await;

    let body = json!({
        "pod": pod_json(Some("1")),
        "nodes": { "items": [ node_json("node1", "4", "8Gi") ] }
    });
    let (_, priorities) = prioritize(app.clone(), body).await;
    assert_eq!(priorities.len(), 1);

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("netbalance_nodes_scored_total"));
    assert!(text.contains("netbalance_score_latency_seconds"));
}
