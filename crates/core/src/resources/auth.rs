// SPDX-License-Identifier: MIT

//! Join-token family: the bootstrap credential a machine presents to
//! join a cluster, and its observed usage/aggregate status.

use crate::ids::{ClusterId, JoinTokenId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinTokenSpec {
    pub cluster: ClusterId,
    #[serde(default)]
    pub expiration_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinToken {
    pub id: JoinTokenId,
    pub spec: JoinTokenSpec,
}

/// Cluster-wide default token used when a machine presents none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultJoinToken {
    pub cluster: ClusterId,
    pub token: JoinTokenId,
}

/// One observed use of a join token by a machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinTokenUsage {
    pub token: JoinTokenId,
    pub machine: String,
    pub used_at_ms: u64,
}

/// Aggregate, requeue-driven status over a cluster's join tokens (C9's
/// sibling time-driven aggregator family, spec.md 2 row C9).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinTokenStatus {
    pub cluster: ClusterId,
    pub active_tokens: u32,
    pub expired_tokens: u32,
}
