//! Balance-aware scoring
//!
//! The score is the weighted mean of per-dimension residual ratios after
//! placing the pod, minus the mean pairwise spread of current utilization
//! ratios:
//!
//! ```text
//! residual  = Σ(E_x · W_x / C_x) / ΣW_x
//! imbalance = (|u_cpu − u_mem| + |u_cpu − u_net| + |u_net − u_mem|) / 3
//! score     = residual − imbalance
//! ```
//!
//! where `E_x = C_x − (U_x + R_x)` and `u_x = U_x / C_x`.

use crate::error::{BalanceError, BalanceResult};
use crate::models::{Dimension, NodeResourceState, ResourceWeights};

/// Largest score a node can receive from a score plugin
pub const MAX_NODE_SCORE: i64 = 100;

/// Components of a node's balance score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    /// Weighted mean of residual capacity ratios after placement
    pub residual: f64,
    /// Mean pairwise spread of current utilization ratios
    pub imbalance: f64,
    /// `residual - imbalance`
    pub value: f64,
}

impl ScoreBreakdown {
    /// Integer score handed to the ranking mechanism, truncated toward zero
    pub fn to_node_score(&self, scale: f64) -> i64 {
        (self.value * scale).trunc() as i64
    }
}

/// Compute the balance score of `node` from its resource state
pub fn balance_score(
    node: &str,
    state: &NodeResourceState,
    weights: &ResourceWeights,
) -> BalanceResult<ScoreBreakdown> {
    for dimension in Dimension::ALL {
        let capacity = state.get(dimension).capacity;
        if !(capacity.is_finite() && capacity > 0.0) {
            return Err(BalanceError::Arithmetic {
                node: node.to_string(),
                dimension: dimension.as_str(),
                value: capacity,
            });
        }
    }

    let weighted: f64 = Dimension::ALL
        .iter()
        .map(|&d| {
            let dim = state.get(d);
            dim.residual() * weights.get(d) / dim.capacity
        })
        .sum();
    let residual = weighted / weights.total();

    let utilization = |d: Dimension| {
        let dim = state.get(d);
        dim.used / dim.capacity
    };
    let (cpu, memory, net) = (
        utilization(Dimension::Cpu),
        utilization(Dimension::Memory),
        utilization(Dimension::Net),
    );
    let imbalance = ((cpu - memory).abs() + (cpu - net).abs() + (net - memory).abs()) / 3.0;

    let value = residual - imbalance;
    if !value.is_finite() {
        return Err(BalanceError::Arithmetic {
            node: node.to_string(),
            dimension: "combined",
            value,
        });
    }

    Ok(ScoreBreakdown {
        residual,
        imbalance,
        value,
    })
}
