//! Error taxonomy for the balance scoring plugin
//!
//! Every error carries a scope: node-scoped errors only make the affected
//! node ineligible, cycle-scoped errors abort the whole scheduling decision
//! for the pending pod. Neither kind ever terminates the host process.

use std::time::Duration;
use thiserror::Error;

/// How far an error propagates through a scheduling cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    /// Only the node being scored is affected
    Node,
    /// The whole cycle for the pending pod is aborted
    Cycle,
}

/// Errors raised by the pre-filter and score phases
#[derive(Debug, Error)]
pub enum BalanceError {
    #[error("failed to list nodes: {0}")]
    TopologyList(String),

    #[error("cycle state key {0:?} not found")]
    StateRead(&'static str),

    #[error("node {0:?} not found")]
    NodeLookup(String),

    #[error("malformed resource request on pod {pod:?}: {reason}")]
    MalformedRequest { pod: String, reason: String },

    #[error("telemetry unavailable for node {node:?}: {source}")]
    Telemetry {
        node: String,
        #[source]
        source: TelemetryError,
    },

    #[error("{dimension} capacity of node {node:?} is {value}, cannot compute ratio")]
    Arithmetic {
        node: String,
        dimension: &'static str,
        value: f64,
    },

    #[error("no network capacity for node {node:?}: {reason}")]
    Capacity { node: String, reason: String },

    #[error("invalid resource weights: {0}")]
    InvalidWeights(String),

    #[error("score scale must be a finite number in (0, {max}], got {value}")]
    InvalidScoreScale { value: f64, max: f64 },
}

impl BalanceError {
    /// Scope of this error within a scheduling cycle
    pub fn scope(&self) -> ErrorScope {
        match self {
            BalanceError::TopologyList(_)
            | BalanceError::StateRead(_)
            | BalanceError::Capacity { .. }
            | BalanceError::InvalidWeights(_)
            | BalanceError::InvalidScoreScale { .. } => ErrorScope::Cycle,
            BalanceError::NodeLookup(_)
            | BalanceError::MalformedRequest { .. }
            | BalanceError::Telemetry { .. }
            | BalanceError::Arithmetic { .. } => ErrorScope::Node,
        }
    }

    /// Short machine-friendly label, used as a metrics label value
    pub fn kind(&self) -> &'static str {
        match self {
            BalanceError::TopologyList(_) => "topology_list",
            BalanceError::StateRead(_) => "state_read",
            BalanceError::NodeLookup(_) => "node_lookup",
            BalanceError::MalformedRequest { .. } => "malformed_request",
            BalanceError::Telemetry { .. } => "telemetry",
            BalanceError::Arithmetic { .. } => "arithmetic",
            BalanceError::Capacity { .. } => "capacity",
            BalanceError::InvalidWeights(_) => "invalid_weights",
            BalanceError::InvalidScoreScale { .. } => "invalid_score_scale",
        }
    }
}

/// Errors raised while reading live network usage from the metrics backend
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("no instance address known for node {0:?}")]
    UnknownInstance(String),

    #[error("query did not complete within {0:?}")]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("metrics backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("metrics backend returned warnings: {}", .0.join("; "))]
    Warnings(Vec<String>),
}

pub type BalanceResult<T> = Result<T, BalanceError>;
