// SPDX-License-Identifier: MIT

//! ClusterMachine: the reconciled allocation of a machine to a cluster,
//! and its observed/derived status resources.

use crate::ids::{ClusterId, MachineId, MachineSetId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMachineSpec {
    pub cluster: ClusterId,
    pub machine_set: MachineSetId,
}

/// `ClusterMachine.id` equals the underlying `MachineId` (I2). `version`
/// here is the resource's store-assigned version, compared against
/// `ClusterMachineConfigStatus.cluster_machine_version` to detect
/// outdated config application (spec.md 4.3 step 3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMachine {
    pub id: MachineId,
    pub version: u64,
    pub spec: ClusterMachineSpec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterMachineStage {
    Unknown,
    Installing,
    Booting,
    Running,
    Rebooting,
    Destroying,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMachineStatus {
    pub stage: ClusterMachineStage,
    pub ready: bool,
    pub apid_available: bool,
    pub connected: bool,
}

impl ClusterMachineStatus {
    pub fn unknown() -> Self {
        Self {
            stage: ClusterMachineStage::Unknown,
            ready: false,
            apid_available: false,
            connected: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyStatus {
    Pending,
    Failed,
    Applied,
}

/// Observed config-application state, written by the (external,
/// not-in-scope) machine-status reconciler and consumed here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMachineConfigStatus {
    pub config_sha: String,
    pub talos_version: String,
    pub schematic_id: String,
    #[serde(default)]
    pub last_error: String,
    pub apply_status: ApplyStatus,
    /// Version of the `ClusterMachine` this status was computed against.
    /// `None` while the machine is still in maintenance (no status yet) —
    /// consumed by C6's maintenance fast-path.
    #[serde(default)]
    pub cluster_machine_version: Option<u64>,
}

/// Ordered patch list composed for a ClusterMachine (C5 output, C4 input).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMachineConfigPatches {
    pub cluster_machine: MachineId,
    pub patches: Vec<String>,
}

/// Opaque marker resource recording per-machine cryptographic identity
/// material. Presence/absence only matters to the reconciler; contents
/// are out of scope (cert mint routines are an external collaborator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMachineIdentity {
    pub cluster_machine: MachineId,
}
