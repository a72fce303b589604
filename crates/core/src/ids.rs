// SPDX-License-Identifier: MIT

//! Typed identifiers for every entity family in spec.md 3.

crate::define_id! {
    /// Identifier of a Cluster.
    pub struct ClusterId("clu-");
}

crate::define_id! {
    /// Identifier of a MachineSet.
    pub struct MachineSetId("mst-");
}

/// Identifier of a physical machine. Shared by `Machine`, `MachineSetNode`
/// and `ClusterMachine` (I2 in spec.md 3: a ClusterMachine exists iff a
/// MachineSetNode with the same id exists).
crate::define_id! {
    pub struct MachineId("mch-");
}

crate::define_id! {
    /// Identifier of a user- or controller-authored config patch.
    pub struct ConfigPatchId("cfp-");
}

crate::define_id! {
    /// Identifier of a join token.
    pub struct JoinTokenId("jtk-");
}

crate::define_id! {
    /// Identifier of a Siderolink `Link`.
    pub struct LinkId("lnk-");
}

crate::define_id! {
    /// Identifier of a `PendingMachine` awaiting acceptance.
    pub struct PendingMachineId("pnd-");
}
