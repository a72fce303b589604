// SPDX-License-Identifier: MIT

//! Link/peer-pool manager (C10, spec.md 4.9): two sibling Q-controllers,
//! one over `Link` and one over `PendingMachine`, share one [`PeersPool`]
//! keyed by `node_public_key`. Each controller writes a `LinkStatus` per
//! `(owner_kind, id)` that records the key it last registered with the
//! pool, so a later reconcile (including one triggered only by the
//! primary's destruction) can find the key to release.

use crate::kinds;
use crate::store_ext::{encode, get_optional, map_store_error, NAMESPACE};
use async_trait::async_trait;
use omni_ctrl_core::resources::{LinkStatus, PeerOwnerKind};
use omni_ctrl_core::{Phase, Reconciled, ReconcileError, ReconcileOutcome};
use omni_ctrl_runtime::{teardown_and_destroy, QController};
use omni_ctrl_store::{Store, StoreError};
use omni_ctrl_adapters::wireguard::{PeerEvent, WireGuardHandler};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

/// `Link` and `PendingMachine` specs are both shaped as just a
/// `node_public_key`; decoding either through this shared shape lets
/// [`reconcile_peer`] stay generic over which kind it's watching.
#[derive(Debug, Clone, Deserialize)]
struct PeerOwnerSpec {
    node_public_key: String,
}

pub const OWNER: &str = "peer_pool_manager";

type Owner = (PeerOwnerKind, String);

#[derive(Debug, Clone, thiserror::Error)]
pub enum PeerPoolError {
    #[error("{owner_kind:?}:{owner_id} already holds peer key {key}")]
    DuplicateOwner {
        key: String,
        owner_kind: PeerOwnerKind,
        owner_id: String,
    },
}

/// `public_key -> owners currently holding a reference to that key`
/// (spec.md 4.9). The underlying WireGuard peer exists exactly while its
/// owner set is non-empty.
pub struct PeersPool {
    wireguard: Arc<dyn WireGuardHandler>,
    owners_by_key: Mutex<HashMap<String, HashSet<Owner>>>,
}

impl PeersPool {
    pub fn new(wireguard: Arc<dyn WireGuardHandler>) -> Self {
        Self {
            wireguard,
            owners_by_key: Mutex::new(HashMap::new()),
        }
    }

    pub fn peer_count(&self) -> usize {
        self.owners_by_key.lock().len()
    }

    /// Registers `owner` as holding `key`. Errors if `owner` already holds
    /// `key` (spec.md 4.9: "duplicate add of the same key by the same
    /// owner is an error"). Emits `PeerEvent(deleted=false)` exactly when
    /// `key` goes from unreferenced to referenced.
    pub async fn add(&self, key: &str, owner: Owner) -> Result<(), PeerPoolError> {
        let became_first = {
            let mut owners_by_key = self.owners_by_key.lock();
            let owners = owners_by_key.entry(key.to_string()).or_default();
            if !owners.insert(owner.clone()) {
                return Err(PeerPoolError::DuplicateOwner {
                    key: key.to_string(),
                    owner_kind: owner.0,
                    owner_id: owner.1,
                });
            }
            owners.len() == 1
        };
        if became_first {
            self.wireguard.apply(PeerEvent { public_key: key.to_string(), deleted: false }).await;
        }
        Ok(())
    }

    /// Releases `owner`'s hold on `key`, a no-op if it held none. Emits
    /// `PeerEvent(deleted=true)` exactly when `key`'s owner set becomes
    /// empty.
    pub async fn remove(&self, key: &str, owner: &Owner) {
        let became_empty = {
            let mut owners_by_key = self.owners_by_key.lock();
            let Some(owners) = owners_by_key.get_mut(key) else {
                return;
            };
            owners.remove(owner);
            let empty = owners.is_empty();
            if empty {
                owners_by_key.remove(key);
            }
            empty
        };
        if became_empty {
            self.wireguard.apply(PeerEvent { public_key: key.to_string(), deleted: true }).await;
        }
    }

    /// Moves `owner`'s hold from `old_key` to `new_key`, producing the
    /// delete-then-add event sequence spec.md 4.9 describes for a key
    /// update (each only fires if the respective refcount actually
    /// crossed zero).
    pub async fn rekey(&self, old_key: &str, new_key: &str, owner: Owner) -> Result<(), PeerPoolError> {
        if old_key == new_key {
            return Ok(());
        }
        self.remove(old_key, &owner).await;
        self.add(new_key, owner).await
    }
}

fn owner_tag(kind: PeerOwnerKind) -> &'static str {
    match kind {
        PeerOwnerKind::Link => "link",
        PeerOwnerKind::PendingMachine => "pending_machine",
    }
}

fn status_id(kind: PeerOwnerKind, id: &str) -> String {
    format!("{}:{}", owner_tag(kind), id)
}

fn map_peer_pool_error(err: PeerPoolError) -> ReconcileError {
    ReconcileError::PolicyRefusal(err.to_string())
}

async fn reconcile_peer(
    store: &dyn Store,
    pool: &PeersPool,
    owner_kind: PeerOwnerKind,
    primary_kind: &str,
    id: &str,
) -> Reconciled<ReconcileError> {
    let status_kind = kinds::LINK_STATUS;
    let status_id = status_id(owner_kind, id);
    let owner: Owner = (owner_kind, id.to_string());

    let existing_status = get_optional::<LinkStatus>(store, NAMESPACE, status_kind, &status_id).await?;
    let primary = get_optional::<PeerOwnerSpec>(store, NAMESPACE, primary_kind, id).await?;

    let desired_key = primary
        .filter(|(meta, _)| meta.phase != Phase::TearingDown)
        .map(|(_, spec)| spec.node_public_key);

    match (existing_status, desired_key) {
        (None, None) => Ok(ReconcileOutcome::Skip),
        (Some((_, status)), None) => {
            pool.remove(&status.node_public_key, &owner).await;
            teardown_and_destroy(store, NAMESPACE, status_kind, &status_id, OWNER).await
        }
        (None, Some(key)) => {
            pool.add(&key, owner.clone()).await.map_err(map_peer_pool_error)?;
            store
                .create(
                    NAMESPACE,
                    status_kind,
                    &status_id,
                    OWNER,
                    encode(&LinkStatus {
                        owner_kind,
                        owner_id: id.to_string(),
                        node_public_key: key,
                    }),
                )
                .await
                .map_err(map_store_error)?;
            Ok(ReconcileOutcome::Ok)
        }
        (Some((_, status)), Some(key)) if status.node_public_key == key => Ok(ReconcileOutcome::Skip),
        (Some((_, status)), Some(key)) => {
            pool.rekey(&status.node_public_key, &key, owner).await.map_err(map_peer_pool_error)?;
            store
                .update_with_conflicts(
                    NAMESPACE,
                    status_kind,
                    &status_id,
                    OWNER,
                    Box::new(move |_meta, spec| {
                        if let Some(obj) = spec.as_object_mut() {
                            obj.insert("node_public_key".to_string(), serde_json::json!(key));
                        }
                        Ok(())
                    }),
                )
                .await
                .map_err(map_store_error)?;
            Ok(ReconcileOutcome::Ok)
        }
    }
}

pub struct LinkStatusController {
    pub store: Arc<dyn Store>,
    pub pool: Arc<PeersPool>,
}

#[async_trait]
impl QController for LinkStatusController {
    fn name(&self) -> &'static str {
        "link_status_controller"
    }

    async fn reconcile(&self, id: &str) -> Reconciled<ReconcileError> {
        reconcile_peer(self.store.as_ref(), self.pool.as_ref(), PeerOwnerKind::Link, kinds::LINK, id).await
    }
}

pub struct PendingMachineStatusController {
    pub store: Arc<dyn Store>,
    pub pool: Arc<PeersPool>,
}

#[async_trait]
impl QController for PendingMachineStatusController {
    fn name(&self) -> &'static str {
        "pending_machine_status_controller"
    }

    async fn reconcile(&self, id: &str) -> Reconciled<ReconcileError> {
        reconcile_peer(self.store.as_ref(), self.pool.as_ref(), PeerOwnerKind::PendingMachine, kinds::PENDING_MACHINE, id).await
    }
}

#[cfg(test)]
#[path = "peer_pool_tests.rs"]
mod tests;
