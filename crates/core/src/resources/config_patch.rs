// SPDX-License-Identifier: MIT

//! ConfigPatch: user- or controller-authored Talos config fragment,
//! selected by the four-level label hierarchy (C5) and swept for orphans
//! by C8.

use crate::ids::{ClusterId, ConfigPatchId, MachineId, MachineSetId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigPatchSpec {
    pub data: String,
}

/// The four label dimensions a ConfigPatch can be scoped to, in
/// increasing specificity (C5) / orphan check order (C8, machine first).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigPatchScope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_set: Option<MachineSetId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_machine: Option<MachineId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine: Option<MachineId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigPatch {
    pub id: ConfigPatchId,
    pub scope: ConfigPatchScope,
    pub spec: ConfigPatchSpec,
}
