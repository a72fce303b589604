// SPDX-License-Identifier: MIT

//! Typed resource specs for every entity family in spec.md 3.
//!
//! Each type here is the `spec` payload a [`crate::meta::Meta`] wraps
//! inside the store; the store itself (`omni-ctrl-store`) is what ties
//! `(Meta, spec)` pairs together under a `(namespace, kind, id)` key.

pub mod auth;
pub mod cluster;
pub mod cluster_machine;
pub mod config_patch;
pub mod machine;
pub mod machine_set;
pub mod redacted;
pub mod siderolink;
pub mod talos_config;

pub use auth::{DefaultJoinToken, JoinToken, JoinTokenSpec, JoinTokenStatus, JoinTokenUsage};
pub use cluster::{
    Cluster, ClusterKubernetesNodes, ClusterSecrets, ClusterSpec, ClusterStatus,
    KubernetesNodeAuditResult, KubernetesStatus, LoadBalancerConfig, LoadBalancerStatus,
    ObservedNode, TalosUpgradePhase, TalosUpgradeStatus,
};
pub use cluster_machine::{
    ApplyStatus, ClusterMachine, ClusterMachineConfigPatches, ClusterMachineConfigStatus,
    ClusterMachineIdentity, ClusterMachineSpec, ClusterMachineStage, ClusterMachineStatus,
};
pub use config_patch::{ConfigPatch, ConfigPatchScope, ConfigPatchSpec};
pub use machine::{
    ClusterMachineTalosVersion, Machine, MachineSetNode, MachineSetNodeSpec, MachineSpec,
    MachineStatus, SchematicConfiguration,
};
pub use machine_set::{
    DeleteStrategy, MachineCountMode, MachineSet, MachineSetMachineCounts, MachineSetPhase,
    MachineSetRole, MachineSetSpec, MachineSetStatus, UpdateStrategy,
};
pub use redacted::{ClusterMachineConfig, MachineConfigDiff, RedactedClusterMachineConfig};
pub use siderolink::{Link, LinkSpec, LinkStatus, PeerOwnerKind, PendingMachine, PendingMachineSpec};
pub use talos_config::{CaRotationPhase, CertRefreshTick, ClusterCaState, TalosConfig};
