// SPDX-License-Identifier: MIT

//! MachineSet: declarative group of machines sharing a role within a cluster.

use crate::ids::{ClusterId, MachineSetId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MachineSetRole {
    ControlPlane,
    Worker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStrategy {
    Unset,
    Rolling { max_parallelism: u32 },
}

impl Default for UpdateStrategy {
    fn default() -> Self {
        UpdateStrategy::Unset
    }
}

impl UpdateStrategy {
    /// Parallelism bound for this strategy, or `None` for unbounded.
    pub fn max_parallelism(&self) -> Option<u32> {
        match self {
            UpdateStrategy::Unset => None,
            UpdateStrategy::Rolling { max_parallelism } => Some((*max_parallelism).max(1)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteStrategy {
    Unset,
    Rolling { max_parallelism: u32 },
}

impl Default for DeleteStrategy {
    fn default() -> Self {
        DeleteStrategy::Unset
    }
}

impl DeleteStrategy {
    pub fn max_parallelism(&self) -> Option<u32> {
        match self {
            DeleteStrategy::Unset => None,
            DeleteStrategy::Rolling { max_parallelism } => Some((*max_parallelism).max(1)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineCountMode {
    /// Desired count is `machine_set_nodes.len()`.
    FromNodes,
    /// Desired count is an explicit number (static machine-class sets).
    Static(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSetSpec {
    pub cluster: ClusterId,
    pub role: MachineSetRole,
    #[serde(default)]
    pub update_strategy: UpdateStrategy,
    #[serde(default)]
    pub delete_strategy: DeleteStrategy,
    #[serde(default = "default_count_mode")]
    pub machine_count_mode: MachineCountMode,
}

fn default_count_mode() -> MachineCountMode {
    MachineCountMode::FromNodes
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSet {
    pub id: MachineSetId,
    pub spec: MachineSetSpec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineSetPhase {
    ScalingUp,
    ScalingDown,
    Reconfiguring,
    Failed,
    Running,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSetMachineCounts {
    pub requested: u32,
    pub total: u32,
    pub healthy: u32,
    pub connected: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSetStatus {
    pub machine_set: MachineSetId,
    pub phase: MachineSetPhase,
    pub ready: bool,
    pub machines: MachineSetMachineCounts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
}
