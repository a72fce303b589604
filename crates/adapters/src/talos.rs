// SPDX-License-Identifier: MIT

//! Talos machine service boundary (spec.md 6), consumed by the MachineSet
//! reconciler's destroy path (C4) and the cert-refresh controller (C9).
//! The gRPC transport is a non-goal; this crate fixes only the method
//! shapes the core calls.

use crate::error::AdapterError;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EtcdMember {
    pub member_id: u64,
    pub hostname: String,
}

#[async_trait]
pub trait TalosMachineClient: Send + Sync {
    async fn etcd_member_list(&self, cluster: &str) -> Result<Vec<EtcdMember>, AdapterError>;
    async fn etcd_remove_member(&self, cluster: &str, hostname: &str) -> Result<(), AdapterError>;
    async fn etcd_remove_member_by_id(&self, cluster: &str, member_id: u64) -> Result<(), AdapterError>;
    async fn etcd_forfeit_leadership(&self, cluster: &str, hostname: &str) -> Result<(), AdapterError>;
    async fn etcd_leave_cluster(&self, cluster: &str, hostname: &str) -> Result<(), AdapterError>;
    async fn apply_configuration(&self, machine: &str, config: &str) -> Result<(), AdapterError>;
    async fn bootstrap(&self, machine: &str) -> Result<(), AdapterError>;
    async fn reset(&self, machine: &str) -> Result<(), AdapterError>;
    async fn upgrade(&self, machine: &str, image: &str) -> Result<(), AdapterError>;
    async fn version(&self, machine: &str) -> Result<String, AdapterError>;
}

/// `true` iff the voter set has more than one member, so removing one
/// still leaves a functioning quorum instead of stranding the cluster on
/// its sole remaining etcd voter (I4, spec.md 4.3 step 4).
pub fn can_scale_down(members: &[EtcdMember]) -> bool {
    members.len() > 1
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct FakeTalosMachineClient {
        pub etcd_members: Mutex<HashMap<String, Vec<EtcdMember>>>,
        pub removed: Mutex<Vec<(String, String)>>,
        pub applied_configs: Mutex<HashMap<String, String>>,
    }

    impl FakeTalosMachineClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_members(&self, cluster: &str, members: Vec<EtcdMember>) {
            self.etcd_members.lock().insert(cluster.to_string(), members);
        }
    }

    #[async_trait]
    impl TalosMachineClient for FakeTalosMachineClient {
        async fn etcd_member_list(&self, cluster: &str) -> Result<Vec<EtcdMember>, AdapterError> {
            Ok(self.etcd_members.lock().get(cluster).cloned().unwrap_or_default())
        }

        async fn etcd_remove_member(&self, cluster: &str, hostname: &str) -> Result<(), AdapterError> {
            self.removed.lock().push((cluster.to_string(), hostname.to_string()));
            let mut members = self.etcd_members.lock();
            if let Some(list) = members.get_mut(cluster) {
                list.retain(|m| m.hostname != hostname);
            }
            Ok(())
        }

        async fn etcd_remove_member_by_id(&self, cluster: &str, member_id: u64) -> Result<(), AdapterError> {
            let mut members = self.etcd_members.lock();
            if let Some(list) = members.get_mut(cluster) {
                list.retain(|m| m.member_id != member_id);
            }
            Ok(())
        }

        async fn etcd_forfeit_leadership(&self, _cluster: &str, _hostname: &str) -> Result<(), AdapterError> {
            Ok(())
        }

        async fn etcd_leave_cluster(&self, _cluster: &str, _hostname: &str) -> Result<(), AdapterError> {
            Ok(())
        }

        async fn apply_configuration(&self, machine: &str, config: &str) -> Result<(), AdapterError> {
            self.applied_configs.lock().insert(machine.to_string(), config.to_string());
            Ok(())
        }

        async fn bootstrap(&self, _machine: &str) -> Result<(), AdapterError> {
            Ok(())
        }

        async fn reset(&self, _machine: &str) -> Result<(), AdapterError> {
            Ok(())
        }

        async fn upgrade(&self, _machine: &str, _image: &str) -> Result<(), AdapterError> {
            Ok(())
        }

        async fn version(&self, _machine: &str) -> Result<String, AdapterError> {
            Ok("1.3.0".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_member_cluster_can_scale_down_to_two() {
        let members = vec![
            EtcdMember { member_id: 1, hostname: "a".into() },
            EtcdMember { member_id: 2, hostname: "b".into() },
            EtcdMember { member_id: 3, hostname: "c".into() },
        ];
        assert!(can_scale_down(&members));
    }

    #[test]
    fn single_member_cluster_cannot_scale_down() {
        let members = vec![EtcdMember { member_id: 1, hostname: "a".into() }];
        assert!(!can_scale_down(&members));
    }
}
