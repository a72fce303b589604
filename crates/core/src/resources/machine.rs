// SPDX-License-Identifier: MIT

//! Physical machines, their declarative membership in a MachineSet, and
//! their observed Talos status.

use crate::ids::{ClusterId, MachineId, MachineSetId};
use serde::{Deserialize, Serialize};

/// Declarative membership of a machine in a machine set. Id equals the
/// underlying `MachineId` (I2 in spec.md 3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSetNodeSpec {
    /// Human-assigned node name; empty means "not yet named" and is a
    /// validation failure (spec.md 7.5 — skip with no write).
    pub node_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSetNode {
    pub id: MachineId,
    pub machine_set: MachineSetId,
    pub spec: MachineSetNodeSpec,
    /// Mirrors the `locked` annotation on the underlying resource meta.
    #[serde(default)]
    pub locked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSpec {
    pub management_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub id: MachineId,
    pub spec: MachineSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineStatus {
    pub machine: MachineId,
    pub hardware_summary: String,
    #[serde(default)]
    pub initial_schematic: Option<String>,
    /// True while the machine has no cluster membership / config status
    /// yet — used by C6's maintenance fast-path.
    #[serde(default)]
    pub in_maintenance: bool,
}

/// Per-machine desired Talos version, written by C6.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMachineTalosVersion {
    pub cluster_machine: MachineId,
    pub talos_version: String,
    pub schematic_id: String,
}

/// Per-level schematic override selected the same way as ConfigPatch
/// (C5's four-level rule, most-specific-wins), consumed by C6.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchematicConfiguration {
    pub id: String,
    pub scope: crate::resources::ConfigPatchScope,
    pub schematic_id: String,
}
