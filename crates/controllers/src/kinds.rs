// SPDX-License-Identifier: MIT

//! Store `kind` string constants, one per resource family in spec.md 3.

pub const CLUSTER: &str = "Cluster";
pub const CLUSTER_STATUS: &str = "ClusterStatus";
pub const LOAD_BALANCER_CONFIG: &str = "LoadBalancerConfig";
pub const LOAD_BALANCER_STATUS: &str = "LoadBalancerStatus";
pub const CLUSTER_SECRETS: &str = "ClusterSecrets";
pub const CLUSTER_KUBERNETES_NODES: &str = "ClusterKubernetesNodes";
pub const KUBERNETES_STATUS: &str = "KubernetesStatus";
pub const KUBERNETES_NODE_AUDIT_RESULT: &str = "KubernetesNodeAuditResult";
pub const TALOS_UPGRADE_STATUS: &str = "TalosUpgradeStatus";

pub const MACHINE_SET: &str = "MachineSet";
pub const MACHINE_SET_STATUS: &str = "MachineSetStatus";
pub const MACHINE_SET_NODE: &str = "MachineSetNode";

pub const MACHINE: &str = "Machine";
pub const MACHINE_STATUS: &str = "MachineStatus";
pub const CLUSTER_MACHINE_TALOS_VERSION: &str = "ClusterMachineTalosVersion";
pub const SCHEMATIC_CONFIGURATION: &str = "SchematicConfiguration";

pub const CLUSTER_MACHINE: &str = "ClusterMachine";
pub const CLUSTER_MACHINE_STATUS: &str = "ClusterMachineStatus";
pub const CLUSTER_MACHINE_CONFIG_STATUS: &str = "ClusterMachineConfigStatus";
pub const CLUSTER_MACHINE_CONFIG_PATCHES: &str = "ClusterMachineConfigPatches";
pub const CLUSTER_MACHINE_IDENTITY: &str = "ClusterMachineIdentity";

pub const CONFIG_PATCH: &str = "ConfigPatch";

pub const JOIN_TOKEN: &str = "JoinToken";
pub const DEFAULT_JOIN_TOKEN: &str = "DefaultJoinToken";
pub const JOIN_TOKEN_USAGE: &str = "JoinTokenUsage";
pub const JOIN_TOKEN_STATUS: &str = "JoinTokenStatus";

pub const LINK: &str = "Link";
pub const PENDING_MACHINE: &str = "PendingMachine";
pub const LINK_STATUS: &str = "LinkStatus";

pub const CLUSTER_MACHINE_CONFIG: &str = "ClusterMachineConfig";
pub const REDACTED_CLUSTER_MACHINE_CONFIG: &str = "RedactedClusterMachineConfig";
pub const MACHINE_CONFIG_DIFF: &str = "MachineConfigDiff";

pub const CLUSTER_CA_STATE: &str = "ClusterCaState";
pub const TALOS_CONFIG: &str = "TalosConfig";
pub const CERT_REFRESH_TICK: &str = "CertRefreshTick";
