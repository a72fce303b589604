// SPDX-License-Identifier: MIT

//! TalosConfig (per-cluster client credentials) and the CA rotation state
//! machine it reads (C9).

use crate::ids::ClusterId;
use serde::{Deserialize, Serialize};

/// CA rotation phase (spec.md 4.8 table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaRotationPhase {
    Ok,
    PreRotate,
    Rotate,
    PostRotate,
}

impl Default for CaRotationPhase {
    fn default() -> Self {
        CaRotationPhase::Ok
    }
}

/// Cluster-wide CA material as tracked by the (external) secrets store;
/// only the rotation phase and the two CA identifiers are modeled here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterCaState {
    pub cluster: ClusterId,
    pub phase: CaRotationPhase,
    pub current_ca: String,
    #[serde(default)]
    pub new_ca: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TalosConfig {
    pub cluster: ClusterId,
    /// Concatenation of accepted CAs in rotation-phase order.
    pub ca: Vec<String>,
    /// CA the client certificate was minted against.
    pub signing_ca: String,
    pub cert_issued_at_ms: u64,
    pub cert_lifetime_ms: u64,
}

/// Singleton tick resource created periodically by the CertRefreshTick
/// controller; downstream controllers watch for its Created event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertRefreshTick {
    pub tick_at_ms: u64,
}
