// SPDX-License-Identifier: MIT

//! Well-known label keys and the label-query primitive (C3).

/// Label carrying the owning cluster id.
pub const LABEL_CLUSTER: &str = "cluster";
/// Label carrying the owning machine set id.
pub const LABEL_MACHINE_SET: &str = "machine_set";
/// Label carrying the owning cluster machine id.
pub const LABEL_CLUSTER_MACHINE: &str = "cluster_machine";
/// Label carrying the underlying physical machine id.
pub const LABEL_MACHINE: &str = "machine";
/// Label carrying the machine set role (`control-plane` | `worker`).
pub const LABEL_ROLE: &str = "role";
/// Annotation marking a MachineSetNode whose ClusterMachine must not be
/// touched by update/upgrade controllers.
pub const ANNOTATION_LOCKED: &str = "locked";
/// Label on a MachineSet that suppresses Kubernetes node deletion and
/// etcd member removal during destroy (spec.md 9, resolved open question:
/// treated as a hard "don't touch the cluster" switch, covering both).
pub const LABEL_SKIP_TEARDOWN: &str = "skip_teardown";

/// An ordered set of `(key, value)` pairs a resource's labels must match
/// exactly for a label query to select it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelQuery {
    pairs: Vec<(String, String)>,
}

impl LabelQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.push((key.into(), value.into()));
        self
    }

    pub fn matches(&self, labels: &std::collections::BTreeMap<String, String>) -> bool {
        self.pairs
            .iter()
            .all(|(k, v)| labels.get(k).map(|lv| lv == v).unwrap_or(false))
    }
}

#[cfg(test)]
#[path = "labels_tests.rs"]
mod tests;
