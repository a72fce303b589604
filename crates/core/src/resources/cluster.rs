// SPDX-License-Identifier: MIT

//! Cluster and cluster-scoped aggregate resources.

use crate::ids::ClusterId;
use serde::{Deserialize, Serialize};

/// Desired Talos version, Kubernetes version and feature flags for a
/// cluster (spec.md 3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub talos_version: String,
    pub kubernetes_version: String,
    #[serde(default)]
    pub feature_flags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: ClusterId,
    pub spec: ClusterSpec,
}

/// Observed readiness of the cluster as a whole. Consumed by C6 to gate
/// the upgrade orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStatus {
    pub cluster: ClusterId,
    pub ready: bool,
}

/// The load balancer fronting the cluster's control plane. `bind_port` is
/// allocated from `[5000, 6000)`, first-available (scenario 1, spec.md 8).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerConfig {
    pub cluster: ClusterId,
    pub bind_port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerStatus {
    pub healthy: bool,
}

/// Opaque marker for the presence of cluster-wide secrets (CA material,
/// etcd bootstrap data). Its absence during teardown is treated as
/// "cluster already gone" (spec.md 4.3 failure semantics).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSecrets {
    pub cluster: ClusterId,
}

/// Client-declared desired Kubernetes node membership for a cluster (C7
/// primary input).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterKubernetesNodes {
    pub cluster: ClusterId,
    pub nodes: Vec<String>,
}

/// One observed Kubernetes node (C7 extra input).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedNode {
    pub name: String,
    pub ready: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubernetesStatus {
    pub cluster: ClusterId,
    pub nodes: Vec<ObservedNode>,
}

/// C7 output: nodes deleted in the most recent audit pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubernetesNodeAuditResult {
    pub cluster: ClusterId,
    pub deleted_nodes: Vec<String>,
}

/// C6 output: cluster-wide Talos upgrade progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TalosUpgradeStatus {
    pub cluster: ClusterId,
    pub phase: TalosUpgradePhase,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_upgrade_version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum TalosUpgradePhase {
    Upgrading,
    Done,
}

impl TalosUpgradeStatus {
    pub fn waiting_for_ready(cluster: ClusterId) -> Self {
        Self {
            cluster,
            phase: TalosUpgradePhase::Upgrading,
            status: "waiting for the cluster to be ready".to_string(),
            last_upgrade_version: None,
        }
    }

    pub fn updating(cluster: ClusterId, done: usize, total: usize) -> Self {
        Self {
            cluster,
            phase: TalosUpgradePhase::Upgrading,
            status: format!("updating machines {}/{}", done, total),
            last_upgrade_version: None,
        }
    }

    pub fn done(cluster: ClusterId, version: String) -> Self {
        Self {
            cluster,
            phase: TalosUpgradePhase::Done,
            status: "updating machines done".to_string(),
            last_upgrade_version: Some(version),
        }
    }
}
