// SPDX-License-Identifier: MIT

//! Redacted config mirroring and rolling diff history (C11).

use crate::ids::MachineId;
use serde::{Deserialize, Serialize};

/// The (external, not-in-scope-to-produce) full machine config this
/// controller mirrors and redacts. Carried as an opaque YAML document
/// with line-addressable secret/cert markers so the redactor doesn't
/// need a full Talos config parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMachineConfig {
    pub machine: MachineId,
    pub yaml: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactedClusterMachineConfig {
    pub machine: MachineId,
    pub yaml: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineConfigDiff {
    pub id: String,
    pub machine: MachineId,
    pub created_at_ms: u64,
    pub unified_diff: String,
}
