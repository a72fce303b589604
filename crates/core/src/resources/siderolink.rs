// SPDX-License-Identifier: MIT

//! Siderolink WireGuard peer family: `Link` and `PendingMachine` each
//! reference a `node_public_key`; `LinkStatus` is the refcounted peer
//! handle managed by the peer pool (C10).

use crate::ids::{LinkId, PendingMachineId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSpec {
    pub node_public_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub spec: LinkSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMachineSpec {
    pub node_public_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMachine {
    pub id: PendingMachineId,
    pub spec: PendingMachineSpec,
}

/// Which of the two Q-controller input kinds produced a given primary id;
/// `LinkStatus` outputs are keyed by `(id, type)` per spec.md 4.9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerOwnerKind {
    Link,
    PendingMachine,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStatus {
    pub owner_kind: PeerOwnerKind,
    pub owner_id: String,
    pub node_public_key: String,
}
