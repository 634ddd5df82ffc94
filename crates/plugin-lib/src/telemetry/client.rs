//! Prometheus HTTP API client for node transmit rates

use super::{NetUsageSource, TelemetryConfig};
use crate::error::TelemetryError;
use crate::observability::SchedulerMetrics;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Instant;
use tracing::debug;
use url::Url;

/// Envelope of every Prometheus API response
#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: String,
    data: Option<QueryData>,
    #[serde(rename = "errorType")]
    error_type: Option<String>,
    error: Option<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(rename = "resultType")]
    result_type: String,
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct VectorSample {
    #[serde(default)]
    metric: HashMap<String, String>,
    value: (f64, String),
}

/// Instant-query client for a Prometheus-compatible backend
pub struct PrometheusClient {
    client: Client,
    query_url: Url,
    config: TelemetryConfig,
    metrics: SchedulerMetrics,
}

impl PrometheusClient {
    /// Create a client; fails only on an invalid endpoint or TLS setup
    pub fn new(config: TelemetryConfig) -> Result<Self, TelemetryError> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;

        let mut base = config.endpoint.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let query_url = Url::parse(&base)
            .and_then(|u| u.join("api/v1/query"))
            .map_err(|e| TelemetryError::Decode(format!("invalid endpoint {:?}: {}", config.endpoint, e)))?;

        Ok(Self {
            client,
            query_url,
            config,
            metrics: SchedulerMetrics::new(),
        })
    }

    pub fn query_url(&self) -> &Url {
        &self.query_url
    }

    /// PromQL expression for the transmit rate of `instance`
    pub fn transmit_query(&self, instance: &str) -> String {
        format!(
            r#"irate(node_network_transmit_bytes_total{{instance=~"{}.*",device!~"{}"}}[{}]) > 0"#,
            instance.replace('.', r"\\."),
            self.config.excluded_devices,
            self.config.window
        )
    }

    async fn query(&self, expr: &str) -> Result<f64, TelemetryError> {
        let timeout = self.config.request_timeout();
        let time = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;

        let response = self
            .client
            .get(self.query_url.clone())
            .query(&[
                ("query", expr.to_string()),
                ("time", format!("{:.3}", time)),
                ("timeout", format!("{}ms", timeout.as_millis())),
            ])
            .send()
            .await
            .map_err(|e| map_request_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TelemetryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| map_request_error(e, timeout))?;
        parse_vector_sum(body)
    }
}

fn map_request_error(err: reqwest::Error, timeout: std::time::Duration) -> TelemetryError {
    if err.is_timeout() {
        TelemetryError::Timeout(timeout)
    } else if err.is_decode() {
        TelemetryError::Decode(err.to_string())
    } else {
        TelemetryError::Http(err)
    }
}

/// Sum of all series of an instant vector; an empty vector reads as zero
fn parse_vector_sum(body: QueryResponse) -> Result<f64, TelemetryError> {
    if body.status != "success" {
        return Err(TelemetryError::Decode(format!(
            "{}: {}",
            body.error_type.unwrap_or_else(|| "error".to_string()),
            body.error.unwrap_or_default()
        )));
    }
    if !body.warnings.is_empty() {
        return Err(TelemetryError::Warnings(body.warnings));
    }

    let data = body
        .data
        .ok_or_else(|| TelemetryError::Decode("missing data".to_string()))?;
    if data.result_type != "vector" {
        return Err(TelemetryError::Decode(format!(
            "expected vector result, got {}",
            data.result_type
        )));
    }

    let samples: Vec<VectorSample> = serde_json::from_value(data.result)
        .map_err(|e| TelemetryError::Decode(e.to_string()))?;

    let mut total = 0.0;
    for sample in samples {
        let value: f64 = sample.value.1.parse().map_err(|_| {
            TelemetryError::Decode(format!("sample value {:?} is not a number", sample.value.1))
        })?;
        if !value.is_finite() {
            return Err(TelemetryError::Decode(format!(
                "non-finite sample for device {:?}",
                sample.metric.get("device")
            )));
        }
        total += value;
    }
    Ok(total)
}

#[async_trait]
impl NetUsageSource for PrometheusClient {
    async fn transmit_rate(&self, node: &str, instance: &str) -> Result<f64, TelemetryError> {
        let expr = self.transmit_query(instance);
        debug!(node = %node, query = %expr, "Querying network usage");

        let deadline = self.config.deadline();
        let start = Instant::now();
        let result = match tokio::time::timeout(deadline, self.query(&expr)).await {
            Ok(result) => result,
            Err(_) => Err(TelemetryError::Timeout(deadline)),
        };
        self.metrics
            .observe_telemetry_latency(start.elapsed().as_secs_f64());

        if result.is_err() {
            self.metrics.inc_telemetry_errors();
        }
        result
    }
}
