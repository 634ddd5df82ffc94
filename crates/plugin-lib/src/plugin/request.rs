//! Aggregation of a pod's requested resources

use crate::error::{BalanceError, BalanceResult};
use crate::models::PodResourceRequest;
use crate::quantity::try_resource_value;
use k8s_openapi::api::core::v1::Pod;
use serde::Deserialize;

/// Pod label/annotation carrying the network request
pub const DEFAULT_NET_REQUEST_KEY: &str = "netRequest";

/// How the pod-level network request is attributed to containers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetRequestPolicy {
    /// The declared value is counted once per container
    #[default]
    PerContainer,
    /// The declared value is counted once for the whole pod
    PerPod,
}

/// Where and how the network request is read
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    pub key: String,
    pub policy: NetRequestPolicy,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            key: DEFAULT_NET_REQUEST_KEY.to_string(),
            policy: NetRequestPolicy::default(),
        }
    }
}

impl RequestConfig {
    /// Sum cpu, memory and network requests of `pod`
    pub fn aggregate(&self, pod: &Pod) -> BalanceResult<PodResourceRequest> {
        let net = self.net_request(pod)?;
        let containers = pod
            .spec
            .as_ref()
            .map(|s| s.containers.as_slice())
            .unwrap_or_default();

        let mut request = PodResourceRequest::default();
        for container in containers {
            let requests = container
                .resources
                .as_ref()
                .and_then(|r| r.requests.as_ref());
            let quantity = |resource: &str| {
                try_resource_value(requests, resource).map_err(|raw| {
                    malformed(
                        pod,
                        format!(
                            "container {:?} requests {} = {:?}, not a quantity",
                            container.name, resource, raw
                        ),
                    )
                })
            };
            request.cpu += quantity("cpu")?;
            request.memory += quantity("memory")?;
        }

        request.net = match self.policy {
            NetRequestPolicy::PerContainer => net * containers.len() as f64,
            NetRequestPolicy::PerPod => net,
        };
        Ok(request)
    }

    fn net_request(&self, pod: &Pod) -> BalanceResult<f64> {
        let meta = &pod.metadata;

        let raw = meta
            .annotations
            .as_ref()
            .and_then(|a| a.get(&self.key))
            .or_else(|| meta.labels.as_ref().and_then(|l| l.get(&self.key)))
            .ok_or_else(|| malformed(pod, format!("{} is not set", self.key)))?;

        let value: f64 = raw
            .trim()
            .parse()
            .map_err(|_| malformed(pod, format!("{} = {:?} is not a number", self.key, raw)))?;
        if !value.is_finite() || value < 0.0 {
            return Err(malformed(
                pod,
                format!("{} = {:?} must be a non-negative number", self.key, raw),
            ));
        }
        Ok(value)
    }
}

fn malformed(pod: &Pod, reason: String) -> BalanceError {
    BalanceError::MalformedRequest {
        pod: pod.metadata.name.clone().unwrap_or_default(),
        reason,
    }
}
