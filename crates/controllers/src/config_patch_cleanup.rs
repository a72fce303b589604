// SPDX-License-Identifier: MIT

//! ConfigPatch cleanup (C8, spec.md 4.7): a periodic sweep that tears
//! down and destroys user-authored ConfigPatches whose every populated
//! scope label points at a resource that no longer exists, once they're
//! old enough that the target resource had a chance to show up.

use crate::kinds;
use crate::store_ext::{encode, list_typed, NAMESPACE};
use async_trait::async_trait;
use omni_ctrl_core::resources::ConfigPatch;
use omni_ctrl_core::{Clock, LabelQuery, Reconciled, ReconcileError, ReconcileOutcome};
use omni_ctrl_runtime::{teardown_and_destroy, Controller};
use omni_ctrl_store::Store;
use std::sync::Arc;
use std::time::Duration;

pub const OWNER: &str = "config_patch_cleanup";

/// How often the sweep runs, absent an override.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(3600);
/// Minimum age before an orphan candidate is actually deleted, so a
/// freshly-authored patch isn't destroyed before its target exists.
pub const DEFAULT_DELETE_OLDER_THAN: Duration = Duration::from_secs(30 * 24 * 3600);

pub struct ConfigPatchCleanupController {
    pub store: Arc<dyn Store>,
    pub clock: Arc<dyn Clock>,
    pub check_interval: Duration,
    pub delete_older_than: Duration,
}

impl ConfigPatchCleanupController {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            check_interval: DEFAULT_CHECK_INTERVAL,
            delete_older_than: DEFAULT_DELETE_OLDER_THAN,
        }
    }

    async fn is_orphan(&self, patch: &ConfigPatch, owner: &str, age_ms: u64) -> Result<bool, ReconcileError> {
        if !owner.is_empty() {
            return Ok(false);
        }
        if (age_ms as u128) < self.delete_older_than.as_millis() {
            return Ok(false);
        }

        // Check order mirrors spec.md 4.7: machine, cluster_machine,
        // machine_set, cluster. Any populated field whose target exists
        // disqualifies the patch from orphan-hood.
        if let Some(machine) = &patch.scope.machine {
            if self.store.get(NAMESPACE, kinds::MACHINE, machine.as_str()).await.is_ok() {
                return Ok(false);
            }
        }
        if let Some(cluster_machine) = &patch.scope.cluster_machine {
            if self.store.get(NAMESPACE, kinds::CLUSTER_MACHINE, cluster_machine.as_str()).await.is_ok() {
                return Ok(false);
            }
        }
        if let Some(machine_set) = &patch.scope.machine_set {
            if self.store.get(NAMESPACE, kinds::MACHINE_SET, machine_set.as_str()).await.is_ok() {
                return Ok(false);
            }
        }
        if let Some(cluster) = &patch.scope.cluster {
            if self.store.get(NAMESPACE, kinds::CLUSTER, cluster.as_str()).await.is_ok() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl Controller for ConfigPatchCleanupController {
    fn name(&self) -> &'static str {
        OWNER
    }

    async fn reconcile(&self) -> Reconciled<ReconcileError> {
        let patches = list_typed::<ConfigPatch>(self.store.as_ref(), NAMESPACE, kinds::CONFIG_PATCH, &LabelQuery::new()).await?;
        let now = self.clock.epoch_ms();

        for (meta, patch) in patches {
            let age_ms = now.saturating_sub(meta.created_at_ms.max(meta.updated_at_ms));
            if self.is_orphan(&patch, &meta.owner, age_ms).await? {
                teardown_and_destroy(self.store.as_ref(), NAMESPACE, kinds::CONFIG_PATCH, patch.id.as_str(), OWNER).await?;
            }
        }

        Ok(ReconcileOutcome::Requeue(self.check_interval))
    }
}

#[cfg(test)]
#[path = "config_patch_cleanup_tests.rs"]
mod tests;
