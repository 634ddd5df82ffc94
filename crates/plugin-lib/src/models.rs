//! Core data models for balance-aware node scoring

use crate::error::{BalanceError, BalanceResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Resource dimensions considered by the balance score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Cpu,
    Memory,
    Net,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Dimension::Cpu, Dimension::Memory, Dimension::Net];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Cpu => "cpu",
            Dimension::Memory => "memory",
            Dimension::Net => "net",
        }
    }
}

/// Network capacity of every node known at pre-filter time.
///
/// Built once per scheduling cycle and never modified afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeCapacitySnapshot {
    capacities: HashMap<String, f64>,
}

impl NodeCapacitySnapshot {
    pub fn new(capacities: HashMap<String, f64>) -> Self {
        Self { capacities }
    }

    /// Network capacity for `node`, if it was known when the snapshot was taken
    pub fn get(&self, node: &str) -> Option<f64> {
        self.capacities.get(node).copied()
    }

    pub fn len(&self) -> usize {
        self.capacities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capacities.is_empty()
    }
}

/// Per-dimension weights, fixed for the lifetime of the plugin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceWeights {
    pub cpu: f64,
    pub memory: f64,
    pub net: f64,
}

impl Default for ResourceWeights {
    fn default() -> Self {
        Self {
            cpu: 1.0,
            memory: 1.0,
            net: 1.0,
        }
    }
}

impl ResourceWeights {
    /// Build weights, rejecting negative, non-finite or all-zero values
    pub fn new(cpu: f64, memory: f64, net: f64) -> BalanceResult<Self> {
        let weights = Self { cpu, memory, net };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> BalanceResult<()> {
        for dimension in Dimension::ALL {
            let w = self.get(dimension);
            if !w.is_finite() || w < 0.0 {
                return Err(BalanceError::InvalidWeights(format!(
                    "{} weight must be a finite non-negative number, got {}",
                    dimension.as_str(),
                    w
                )));
            }
        }
        if self.total() <= 0.0 {
            return Err(BalanceError::InvalidWeights(
                "weights must sum to a positive value".to_string(),
            ));
        }
        Ok(())
    }

    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Cpu => self.cpu,
            Dimension::Memory => self.memory,
            Dimension::Net => self.net,
        }
    }

    pub fn total(&self) -> f64 {
        self.cpu + self.memory + self.net
    }
}

/// Resources requested by the pending pod, summed across its containers
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PodResourceRequest {
    pub cpu: f64,
    pub memory: f64,
    pub net: f64,
}

impl PodResourceRequest {
    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Cpu => self.cpu,
            Dimension::Memory => self.memory,
            Dimension::Net => self.net,
        }
    }
}

/// Capacity, current usage and pending request of one dimension on one node
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DimensionState {
    pub capacity: f64,
    pub used: f64,
    pub requested: f64,
}

impl DimensionState {
    pub fn new(capacity: f64, used: f64, requested: f64) -> Self {
        Self {
            capacity,
            used,
            requested,
        }
    }

    /// Usage after placing the pod
    pub fn projected(&self) -> f64 {
        self.used + self.requested
    }

    /// Capacity left after placing the pod; negative when overcommitted
    pub fn residual(&self) -> f64 {
        self.capacity - self.projected()
    }
}

/// Transient per-node view assembled for a single score call
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NodeResourceState {
    pub cpu: DimensionState,
    pub memory: DimensionState,
    pub net: DimensionState,
}

impl NodeResourceState {
    pub fn get(&self, dimension: Dimension) -> &DimensionState {
        match dimension {
            Dimension::Cpu => &self.cpu,
            Dimension::Memory => &self.memory,
            Dimension::Net => &self.net,
        }
    }
}
