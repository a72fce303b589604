// SPDX-License-Identifier: MIT

//! Kubernetes node auditor (C7, spec.md 4.6): deletes Kubernetes nodes
//! that have fallen out of a cluster's desired membership, after a grace
//! window. The per-node grace timer is process-wide state, not a store
//! resource — a restart re-starting the timer is an accepted safety
//! tradeoff (spec.md 4.6).

use crate::kinds;
use crate::store_ext::{encode, get_optional, map_store_error, NAMESPACE};
use async_trait::async_trait;
use omni_ctrl_adapters::KubernetesClient;
use omni_ctrl_core::resources::{ClusterKubernetesNodes, KubernetesNodeAuditResult, KubernetesStatus};
use omni_ctrl_core::{Clock, Reconciled, ReconcileError, ReconcileOutcome};
use omni_ctrl_runtime::QController;
use omni_ctrl_store::{Store, StoreError};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

pub const OWNER: &str = "k8s_node_auditor";

/// Grace window a node must stay invalid before it's deleted, absent an
/// explicit override.
pub const DEFAULT_DELETE_OLDER_THAN: Duration = Duration::from_secs(300);

pub struct KubernetesNodeAuditorController {
    pub store: Arc<dyn Store>,
    pub clock: Arc<dyn Clock>,
    pub kubernetes: Arc<dyn KubernetesClient>,
    pub delete_older_than: Duration,
    invalid_since: Mutex<HashMap<String, HashMap<String, u64>>>,
}

impl KubernetesNodeAuditorController {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, kubernetes: Arc<dyn KubernetesClient>) -> Self {
        Self {
            store,
            clock,
            kubernetes,
            delete_older_than: DEFAULT_DELETE_OLDER_THAN,
            invalid_since: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl QController for KubernetesNodeAuditorController {
    fn name(&self) -> &'static str {
        OWNER
    }

    async fn reconcile(&self, cluster_id: &str) -> Reconciled<ReconcileError> {
        let Some((_, desired)) = get_optional::<ClusterKubernetesNodes>(self.store.as_ref(), NAMESPACE, kinds::CLUSTER_KUBERNETES_NODES, cluster_id).await?
        else {
            return Ok(ReconcileOutcome::Ok);
        };
        let observed = get_optional::<KubernetesStatus>(self.store.as_ref(), NAMESPACE, kinds::KUBERNETES_STATUS, cluster_id)
            .await?
            .map(|(_, s)| s)
            .unwrap_or_default();

        let desired_names: HashSet<&str> = desired.nodes.iter().map(String::as_str).collect();
        let invalid: HashSet<&str> = observed
            .nodes
            .iter()
            .map(|n| n.name.as_str())
            .filter(|name| !desired_names.contains(name))
            .collect();

        if invalid.is_empty() {
            self.invalid_since.lock().remove(cluster_id);
            return Ok(ReconcileOutcome::Ok);
        }

        let now = self.clock.epoch_ms();
        let ready_to_delete: Vec<String>;
        let pending_nonempty: bool;
        {
            let mut guard = self.invalid_since.lock();
            let timers = guard.entry(cluster_id.to_string()).or_default();
            timers.retain(|name, _| invalid.contains(name.as_str()));
            for name in &invalid {
                timers.entry((*name).to_string()).or_insert(now);
            }

            let mut ready = Vec::new();
            let mut pending = false;
            for name in &invalid {
                let since = timers.get(*name).copied().unwrap_or(now);
                if now.saturating_sub(since) as u128 >= self.delete_older_than.as_millis() {
                    ready.push((*name).to_string());
                } else {
                    pending = true;
                }
            }
            ready.sort();
            ready_to_delete = ready;
            pending_nonempty = pending;
        }

        if ready_to_delete.is_empty() && pending_nonempty {
            return Ok(ReconcileOutcome::Requeue(self.delete_older_than + Duration::from_secs(1)));
        }

        let still_ready: HashMap<&str, bool> = observed.nodes.iter().map(|n| (n.name.as_str(), n.ready)).collect();
        let mut deleted = Vec::new();
        let mut any_failed = false;
        for name in &ready_to_delete {
            if still_ready.get(name.as_str()).copied().unwrap_or(false) {
                if let Some(timers) = self.invalid_since.lock().get_mut(cluster_id) {
                    timers.remove(name);
                }
                continue;
            }
            match self.kubernetes.delete_node(desired.cluster.as_str(), name).await {
                Ok(()) => {
                    if let Some(timers) = self.invalid_since.lock().get_mut(cluster_id) {
                        timers.remove(name);
                    }
                    deleted.push(name.clone());
                }
                Err(_) => any_failed = true,
            }
        }
        deleted.sort();

        self.write_result(cluster_id, deleted).await?;

        if any_failed || pending_nonempty {
            Ok(ReconcileOutcome::Requeue(self.delete_older_than + Duration::from_secs(1)))
        } else {
            Ok(ReconcileOutcome::Ok)
        }
    }
}

impl KubernetesNodeAuditorController {
    async fn write_result(&self, cluster_id: &str, deleted_nodes: Vec<String>) -> Result<(), ReconcileError> {
        let result = KubernetesNodeAuditResult {
            cluster: cluster_id.into(),
            deleted_nodes,
        };
        match self.store.get(NAMESPACE, kinds::KUBERNETES_NODE_AUDIT_RESULT, cluster_id).await {
            Ok(_) => {
                self.store
                    .update_with_conflicts(
                        NAMESPACE,
                        kinds::KUBERNETES_NODE_AUDIT_RESULT,
                        cluster_id,
                        OWNER,
                        Box::new(move |_meta, spec| {
                            *spec = encode(&result);
                            Ok(())
                        }),
                    )
                    .await
                    .map_err(map_store_error)?;
            }
            Err(StoreError::NotFound { .. }) => {
                self.store
                    .create(NAMESPACE, kinds::KUBERNETES_NODE_AUDIT_RESULT, cluster_id, OWNER, encode(&result))
                    .await
                    .map_err(map_store_error)?;
            }
            Err(err) => return Err(map_store_error(err)),
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "k8s_node_auditor_tests.rs"]
mod tests;
