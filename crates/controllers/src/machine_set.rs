// SPDX-License-Identifier: MIT

//! MachineSet reconciler (C4, spec.md 4.3): the largest and most delicate
//! controller. Drives `ClusterMachine` membership toward a MachineSet's
//! declared `MachineSetNode`s, composes each machine's config patch list
//! via C5, serializes control-plane updates/destroys for quorum safety,
//! and writes the aggregate `MachineSetStatus`.

use crate::config_patch_composer::{compose_patches, PatchTarget};
use crate::kinds;
use crate::store_ext::{encode, get_optional, list_typed, map_store_error, NAMESPACE};
use async_trait::async_trait;
use omni_ctrl_adapters::{can_scale_down, DiscoveryClient, KubernetesClient, TalosMachineClient};
use omni_ctrl_core::ids::{ClusterId, MachineId, MachineSetId};
use omni_ctrl_core::labels::{LABEL_CLUSTER, LABEL_MACHINE_SET, LABEL_ROLE, LABEL_SKIP_TEARDOWN};
use omni_ctrl_core::resources::{
    ApplyStatus, Cluster, ClusterMachine, ClusterMachineConfigPatches, ClusterMachineConfigStatus,
    ClusterMachineIdentity, ClusterMachineSpec, ClusterMachineStatus, ClusterSecrets, ConfigPatch, LoadBalancerConfig,
    LoadBalancerStatus, MachineCountMode, MachineSetNode, MachineSetPhase, MachineSetRole, MachineSetSpec,
    MachineSetStatus, UpdateStrategy,
};
use omni_ctrl_core::{Clock, LabelQuery, Meta, Reconciled, ReconcileError};
use omni_ctrl_runtime::{fingerprint_inputs, teardown_and_destroy, QController, INPUT_FINGERPRINT_ANNOTATION};
use omni_ctrl_store::{Store, StoreError};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub const OWNER: &str = "machine_set_reconciler";
const MACHINE_FINALIZER: &str = "machine_set_reconciler/allocated";
/// First-available load-balancer bind port range (scenario 1, spec.md 8).
const LOAD_BALANCER_PORT_RANGE: std::ops::Range<u16> = 5000..6000;

pub struct MachineSetController {
    pub store: Arc<dyn Store>,
    pub clock: Arc<dyn Clock>,
    pub talos: Arc<dyn TalosMachineClient>,
    pub kubernetes: Arc<dyn KubernetesClient>,
    pub discovery: Arc<dyn DiscoveryClient>,
}

struct Context {
    id: MachineSetId,
    cluster: ClusterId,
    spec: MachineSetSpec,
    meta_version: u64,
    cluster_version: u64,
    nodes: Vec<(Meta, MachineSetNode)>,
    cluster_machines: Vec<(Meta, ClusterMachine)>,
    all_patches: Vec<ConfigPatch>,
    patch_versions: HashMap<String, u64>,
}

#[async_trait]
impl QController for MachineSetController {
    fn name(&self) -> &'static str {
        OWNER
    }

    async fn reconcile(&self, id: &str) -> Reconciled<ReconcileError> {
        self.reconcile_machine_set(id).await
    }
}

impl MachineSetController {
    async fn reconcile_machine_set(&self, id: &str) -> Reconciled<ReconcileError> {
        let Some((meta, spec)) = get_optional::<MachineSetSpec>(self.store.as_ref(), NAMESPACE, kinds::MACHINE_SET, id).await? else {
            return Ok(omni_ctrl_core::ReconcileOutcome::Ok);
        };

        if meta.phase == omni_ctrl_core::Phase::TearingDown {
            return self.teardown_machine_set(&meta, &spec).await;
        }

        let ctx = self.build_context(id, &meta, &spec).await?;

        self.create_missing(&ctx).await?;
        if ctx.spec.role == MachineSetRole::ControlPlane {
            self.ensure_load_balancer_config(&ctx).await?;
        }

        let created_any = ctx.nodes.len() > ctx.cluster_machines.len();
        if !created_any {
            self.update_existing(&ctx).await?;
            self.destroy_stale(&ctx).await?;
        }

        self.write_status(&ctx).await?;
        Ok(omni_ctrl_core::ReconcileOutcome::Ok)
    }

    async fn build_context(&self, id: &str, meta: &Meta, spec: &MachineSetSpec) -> Result<Context, ReconcileError> {
        let machine_set_id: MachineSetId = id.into();
        let nodes: Vec<(Meta, MachineSetNode)> =
            list_typed::<MachineSetNode>(self.store.as_ref(), NAMESPACE, kinds::MACHINE_SET_NODE, &LabelQuery::new())
                .await?
                .into_iter()
                .filter(|(_, n)| n.machine_set == machine_set_id)
                .collect();
        let cluster_machines: Vec<(Meta, ClusterMachine)> =
            list_typed::<ClusterMachine>(self.store.as_ref(), NAMESPACE, kinds::CLUSTER_MACHINE, &LabelQuery::new())
                .await?
                .into_iter()
                .filter(|(_, cm)| cm.spec.machine_set == machine_set_id)
                .collect();
        let patches_with_meta =
            list_typed::<ConfigPatch>(self.store.as_ref(), NAMESPACE, kinds::CONFIG_PATCH, &LabelQuery::new()).await?;
        let patch_versions = patches_with_meta.iter().map(|(m, p)| (p.id.as_str().to_string(), m.version)).collect();
        let all_patches = patches_with_meta.into_iter().map(|(_, p)| p).collect();
        let cluster_version = get_optional::<Cluster>(self.store.as_ref(), NAMESPACE, kinds::CLUSTER, spec.cluster.as_str())
            .await?
            .map(|(m, _)| m.version)
            .unwrap_or(0);
        Ok(Context {
            id: id.into(),
            cluster: spec.cluster.clone(),
            spec: spec.clone(),
            meta_version: meta.version,
            cluster_version,
            nodes,
            cluster_machines,
            all_patches,
            patch_versions,
        })
    }

    /// Allocates and creates the control plane's fronting load balancer
    /// the first time it reconciles (scenario 1, spec.md 8): first
    /// unused `bind_port` in `[5000, 6000)` across every existing
    /// `LoadBalancerConfig`.
    async fn ensure_load_balancer_config(&self, ctx: &Context) -> Result<(), ReconcileError> {
        let used: HashSet<u16> =
            list_typed::<LoadBalancerConfig>(self.store.as_ref(), NAMESPACE, kinds::LOAD_BALANCER_CONFIG, &LabelQuery::new())
                .await?
                .into_iter()
                .map(|(_, c)| c.bind_port)
                .collect();
        let Some(bind_port) = LOAD_BALANCER_PORT_RANGE.find(|p| !used.contains(p)) else {
            return Err(ReconcileError::Transient("no free load balancer bind port in [5000, 6000)".into()));
        };
        self.store
            .create(
                NAMESPACE,
                kinds::LOAD_BALANCER_CONFIG,
                ctx.cluster.as_str(),
                OWNER,
                encode(&LoadBalancerConfig { cluster: ctx.cluster.clone(), bind_port }),
            )
            .await
            .or_else(ignore_already_exists)
            .map_err(map_store_error)?;
        Ok(())
    }

    fn desired_count(&self, ctx: &Context) -> usize {
        match ctx.spec.machine_count_mode {
            MachineCountMode::FromNodes => ctx.nodes.len(),
            MachineCountMode::Static(n) => n as usize,
        }
    }

    async fn create_missing(&self, ctx: &Context) -> Result<(), ReconcileError> {
        for (node_meta, node) in &ctx.nodes {
            if node.spec.node_name.is_empty() {
                continue; // spec.md 7.5: validation failure, skip with no write
            }
            if ctx.cluster_machines.iter().any(|(_, cm)| cm.id == node.id) {
                continue;
            }
            let machine_id: MachineId = node.id.clone();
            let patches = self.compose_for(ctx, &machine_id);

            self.store
                .create(
                    NAMESPACE,
                    kinds::CLUSTER_MACHINE,
                    machine_id.as_str(),
                    OWNER,
                    encode(&ClusterMachine {
                        id: machine_id.clone(),
                        version: 1,
                        spec: ClusterMachineSpec {
                            cluster: ctx.cluster.clone(),
                            machine_set: ctx.id.clone(),
                        },
                    }),
                )
                .await
                .or_else(ignore_already_exists)
                .map_err(map_store_error)?;
            self.label_cluster_machine(ctx, &node_meta.labels.get(LABEL_ROLE).cloned().unwrap_or_default(), &machine_id)
                .await?;

            self.store
                .create(
                    NAMESPACE,
                    kinds::CLUSTER_MACHINE_CONFIG_PATCHES,
                    machine_id.as_str(),
                    OWNER,
                    encode(&ClusterMachineConfigPatches {
                        cluster_machine: machine_id.clone(),
                        patches: patches.iter().map(|p| p.as_str().to_string()).collect(),
                    }),
                )
                .await
                .or_else(ignore_already_exists)
                .map_err(map_store_error)?;

            self.store
                .add_finalizer(NAMESPACE, kinds::MACHINE, machine_id.as_str(), MACHINE_FINALIZER)
                .await
                .map_err(map_store_error)?;
        }
        Ok(())
    }

    async fn label_cluster_machine(&self, ctx: &Context, role: &str, machine_id: &MachineId) -> Result<(), ReconcileError> {
        let cluster = ctx.cluster.to_string();
        let machine_set = ctx.id.to_string();
        let role = role.to_string();
        self.store
            .update_with_conflicts(
                NAMESPACE,
                kinds::CLUSTER_MACHINE,
                machine_id.as_str(),
                OWNER,
                Box::new(move |meta, _spec| {
                    meta.labels.insert(LABEL_CLUSTER.to_string(), cluster);
                    meta.labels.insert(LABEL_MACHINE_SET.to_string(), machine_set);
                    if !role.is_empty() {
                        meta.labels.insert(LABEL_ROLE.to_string(), role);
                    }
                    Ok(())
                }),
            )
            .await
            .map_err(map_store_error)?;
        Ok(())
    }

    fn compose_for(&self, ctx: &Context, machine_id: &MachineId) -> Vec<omni_ctrl_core::ids::ConfigPatchId> {
        let target = PatchTarget {
            cluster: &ctx.cluster,
            machine_set: &ctx.id,
            cluster_machine: machine_id,
            machine: machine_id,
        };
        compose_patches(&ctx.all_patches, &target)
    }

    async fn update_existing(&self, ctx: &Context) -> Result<(), ReconcileError> {
        let cap = match ctx.spec.role {
            MachineSetRole::ControlPlane => Some(1u32),
            MachineSetRole::Worker => ctx.spec.update_strategy.max_parallelism(),
        };

        let mut candidates = Vec::new();
        for (cm_meta, cm) in &ctx.cluster_machines {
            let Some((node_meta, node)) = ctx.nodes.iter().find(|(_, n)| n.id == cm.id).map(|(m, n)| (m.clone(), n.clone()))
            else {
                continue;
            };
            if node_meta.annotations.contains_key(omni_ctrl_core::labels::ANNOTATION_LOCKED) || node.locked {
                continue;
            }
            let desired_patches = self.compose_for(ctx, &cm.id);
            let desired_strs: Vec<String> = desired_patches.iter().map(|p| p.as_str().to_string()).collect();
            let status = get_optional::<ClusterMachineConfigStatus>(self.store.as_ref(), NAMESPACE, kinds::CLUSTER_MACHINE_CONFIG_STATUS, cm.id.as_str()).await?;

            // Input fingerprint over every resource that feeds this
            // machine's config: its composed patch list, the cluster
            // spec, and the machine set spec (spec.md 4.2, C3).
            let fingerprint_inputs_list: Vec<(&str, &str, u64)> = desired_strs
                .iter()
                .map(|id| (kinds::CONFIG_PATCH, id.as_str(), ctx.patch_versions.get(id).copied().unwrap_or(0)))
                .chain(std::iter::once((kinds::CLUSTER, ctx.cluster.as_str(), ctx.cluster_version)))
                .chain(std::iter::once((kinds::MACHINE_SET, ctx.id.as_str(), ctx.meta_version)))
                .collect();
            let fingerprint = fingerprint_inputs(&fingerprint_inputs_list);
            let fingerprint_changed = cm_meta.annotations.get(INPUT_FINGERPRINT_ANNOTATION).map(String::as_str) != Some(fingerprint.as_str());

            let is_outdated = status
                .as_ref()
                .map(|(_, s)| s.cluster_machine_version != Some(cm_meta.version) || !s.last_error.is_empty())
                .unwrap_or(false);
            let needs_update = fingerprint_changed || status.as_ref().map(|(_, s)| s.cluster_machine_version.is_none()).unwrap_or(true);

            if needs_update {
                candidates.push((cm.id.clone(), desired_strs, fingerprint, is_outdated));
            }
        }

        // Prioritization rule: if any outdated candidate exists, restrict the
        // batch to outdated ones only (spec.md 4.3 step 3).
        let any_outdated = candidates.iter().any(|(_, _, _, outdated)| *outdated);
        let mut selected: Vec<_> = candidates.into_iter().filter(|(_, _, _, outdated)| !any_outdated || *outdated).collect();
        selected.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
        if let Some(cap) = cap {
            selected.truncate(cap as usize);
        }

        for (machine_id, patches, fingerprint, _) in selected {
            self.store
                .update_with_conflicts(
                    NAMESPACE,
                    kinds::CLUSTER_MACHINE_CONFIG_PATCHES,
                    machine_id.as_str(),
                    OWNER,
                    Box::new(move |_meta, spec| {
                        *spec = encode(&ClusterMachineConfigPatches {
                            cluster_machine: machine_id.clone(),
                            patches: patches.clone(),
                        });
                        Ok(())
                    }),
                )
                .await
                .or_else(ignore_not_found)
                .map_err(map_store_error)?;

            self.store
                .update_with_conflicts(
                    NAMESPACE,
                    kinds::CLUSTER_MACHINE,
                    machine_id.as_str(),
                    OWNER,
                    Box::new(move |meta, _spec| {
                        meta.annotations.insert(INPUT_FINGERPRINT_ANNOTATION.to_string(), fingerprint.clone());
                        Ok(())
                    }),
                )
                .await
                .or_else(ignore_not_found)
                .map_err(map_store_error)?;
        }
        Ok(())
    }

    async fn destroy_stale(&self, ctx: &Context) -> Result<(), ReconcileError> {
        let mut candidates: Vec<MachineId> = ctx
            .cluster_machines
            .iter()
            .filter(|(_, cm)| !ctx.nodes.iter().any(|(_, n)| n.id == cm.id))
            .map(|(_, cm)| cm.id.clone())
            .collect();
        candidates.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        if candidates.is_empty() {
            return Ok(());
        }

        // Load-balancer unhealthy blocks destroys but not creates/updates
        // (spec.md 4.3 failure semantics); absence is not a block (spec.md
        // 7.2, not-found on an optional input).
        let lb_status =
            get_optional::<LoadBalancerStatus>(self.store.as_ref(), NAMESPACE, kinds::LOAD_BALANCER_STATUS, ctx.cluster.as_str()).await?;
        if let Some((_, status)) = &lb_status {
            if !status.healthy {
                return Err(ReconcileError::PolicyRefusal("load balancer unhealthy, refusing to destroy machines".into()));
            }
        }

        let cap = match ctx.spec.role {
            MachineSetRole::ControlPlane => Some(1u32),
            MachineSetRole::Worker => ctx.spec.delete_strategy.max_parallelism(),
        };
        if let Some(cap) = cap {
            candidates.truncate(cap as usize);
        }

        if ctx.spec.role == MachineSetRole::ControlPlane {
            if ctx.cluster_machines.len() <= 1 {
                return Err(ReconcileError::PolicyRefusal(
                    "refusing to remove the sole remaining control-plane machine".into(),
                ));
            }
            let members = self
                .talos
                .etcd_member_list(ctx.cluster.as_str())
                .await
                .map_err(|e| ReconcileError::Transient(e.to_string()))?;
            if !members.is_empty() && !can_scale_down(&members) {
                return Err(ReconcileError::PolicyRefusal(
                    "etcd quorum would be lost by this scale-down".into(),
                ));
            }
        }

        let skip_teardown = self.machine_set_has_skip_teardown(ctx).await?;

        for machine_id in candidates {
            let outcome = teardown_and_destroy(self.store.as_ref(), NAMESPACE, kinds::CLUSTER_MACHINE, machine_id.as_str(), OWNER).await?;
            if !matches!(outcome, omni_ctrl_core::ReconcileOutcome::Ok) {
                continue;
            }

            if !skip_teardown {
                self.kubernetes
                    .delete_node(ctx.cluster.as_str(), machine_id.as_str())
                    .await
                    .map_err(|e| ReconcileError::Transient(e.to_string()))?;
                self.discovery
                    .affiliate_delete(ctx.cluster.as_str(), machine_id.as_str())
                    .await
                    .map_err(|e| ReconcileError::Transient(e.to_string()))?;
            }

            self.store
                .remove_finalizer(NAMESPACE, kinds::MACHINE, machine_id.as_str(), MACHINE_FINALIZER)
                .await
                .map_err(map_store_error)?;

            self.store
                .destroy(NAMESPACE, kinds::CLUSTER_MACHINE_CONFIG_PATCHES, machine_id.as_str(), OWNER)
                .await
                .map_err(map_store_error)?;
        }
        Ok(())
    }

    async fn machine_set_has_skip_teardown(&self, ctx: &Context) -> Result<bool, ReconcileError> {
        let resource = self.store.get(NAMESPACE, kinds::MACHINE_SET, ctx.id.as_str()).await.map_err(map_store_error)?;
        Ok(resource.meta.labels.contains_key(LABEL_SKIP_TEARDOWN))
    }

    async fn teardown_machine_set(&self, meta: &Meta, spec: &MachineSetSpec) -> Reconciled<ReconcileError> {
        let machine_set_id: MachineSetId = meta.id.as_str().into();
        let cluster_machines: Vec<(Meta, ClusterMachine)> =
            list_typed::<ClusterMachine>(self.store.as_ref(), NAMESPACE, kinds::CLUSTER_MACHINE, &LabelQuery::new())
                .await?
                .into_iter()
                .filter(|(_, cm)| cm.spec.machine_set == machine_set_id)
                .collect();

        if cluster_machines.is_empty() {
            self.store
                .remove_finalizer(NAMESPACE, kinds::MACHINE_SET, meta.id.as_str(), OWNER)
                .await
                .map_err(map_store_error)?;
            return Ok(omni_ctrl_core::ReconcileOutcome::Ok);
        }

        // Loss of cluster secrets during teardown is treated as "cluster
        // already gone": finish teardown without attempting external
        // deletes against a cluster that no longer exists (spec.md 4.3
        // failure semantics).
        let cluster_gone =
            get_optional::<ClusterSecrets>(self.store.as_ref(), NAMESPACE, kinds::CLUSTER_SECRETS, spec.cluster.as_str()).await?.is_none();

        for (_, cm) in &cluster_machines {
            let outcome = teardown_and_destroy(self.store.as_ref(), NAMESPACE, kinds::CLUSTER_MACHINE, cm.id.as_str(), OWNER).await?;
            if matches!(outcome, omni_ctrl_core::ReconcileOutcome::Ok) {
                if !cluster_gone {
                    self.kubernetes
                        .delete_node(spec.cluster.as_str(), cm.id.as_str())
                        .await
                        .map_err(|e| ReconcileError::Transient(e.to_string()))?;
                    self.discovery
                        .affiliate_delete(spec.cluster.as_str(), cm.id.as_str())
                        .await
                        .map_err(|e| ReconcileError::Transient(e.to_string()))?;
                }
                self.store
                    .remove_finalizer(NAMESPACE, kinds::MACHINE, cm.id.as_str(), MACHINE_FINALIZER)
                    .await
                    .map_err(map_store_error)?;
            }
        }
        Ok(omni_ctrl_core::ReconcileOutcome::Requeue(std::time::Duration::from_secs(1)))
    }

    async fn write_status(&self, ctx: &Context) -> Result<(), ReconcileError> {
        let desired = self.desired_count(ctx);
        let current = ctx.cluster_machines.len();

        let mut healthy = 0u32;
        let mut connected = 0u32;
        let mut all_applied = true;
        let mut any_pending = false;
        let mut statuses_missing = false;
        let mut config_shas = Vec::new();

        for (cm_meta, cm) in &ctx.cluster_machines {
            let status = get_optional::<ClusterMachineStatus>(self.store.as_ref(), NAMESPACE, kinds::CLUSTER_MACHINE_STATUS, cm.id.as_str()).await?;
            match &status {
                Some((_, status)) => {
                    if status.ready {
                        healthy += 1;
                    }
                    if status.connected {
                        connected += 1;
                    }
                }
                None => statuses_missing = true,
            }
            if get_optional::<ClusterMachineIdentity>(self.store.as_ref(), NAMESPACE, kinds::CLUSTER_MACHINE_IDENTITY, cm.id.as_str())
                .await?
                .is_none()
            {
                statuses_missing = true;
            }
            let config_status =
                get_optional::<ClusterMachineConfigStatus>(self.store.as_ref(), NAMESPACE, kinds::CLUSTER_MACHINE_CONFIG_STATUS, cm.id.as_str()).await?;
            match &config_status {
                Some((_, cs)) => {
                    if cs.apply_status != ApplyStatus::Applied || cs.cluster_machine_version != Some(cm_meta.version) {
                        all_applied = false;
                    }
                    if cs.apply_status == ApplyStatus::Pending {
                        any_pending = true;
                    }
                    config_shas.push(cs.config_sha.clone());
                }
                None => {
                    all_applied = false;
                    statuses_missing = true;
                }
            }
        }

        let phase = if desired > current || statuses_missing {
            MachineSetPhase::ScalingUp
        } else if current > desired {
            MachineSetPhase::ScalingDown
        } else if any_pending {
            MachineSetPhase::Reconfiguring
        } else if ctx.spec.role == MachineSetRole::ControlPlane && desired == 0 {
            MachineSetPhase::Failed
        } else {
            MachineSetPhase::Running
        };

        let ready = phase == MachineSetPhase::Running && all_applied;
        let config_hash = if ready {
            config_shas.sort();
            let mut hasher = Sha256::new();
            for sha in &config_shas {
                hasher.update(sha.as_bytes());
            }
            Some(format!("{:x}", hasher.finalize()))
        } else {
            None
        };

        let status = MachineSetStatus {
            machine_set: ctx.id.clone(),
            phase,
            ready,
            machines: omni_ctrl_core::resources::MachineSetMachineCounts {
                requested: desired as u32,
                total: current as u32,
                healthy,
                connected,
            },
            config_hash,
        };

        match self.store.get(NAMESPACE, kinds::MACHINE_SET_STATUS, ctx.id.as_str()).await {
            Ok(_) => {
                self.store
                    .update_with_conflicts(
                        NAMESPACE,
                        kinds::MACHINE_SET_STATUS,
                        ctx.id.as_str(),
                        OWNER,
                        Box::new(move |_meta, spec| {
                            *spec = encode(&status);
                            Ok(())
                        }),
                    )
                    .await
                    .map_err(map_store_error)?;
            }
            Err(StoreError::NotFound { .. }) => {
                self.store
                    .create(NAMESPACE, kinds::MACHINE_SET_STATUS, ctx.id.as_str(), OWNER, encode(&status))
                    .await
                    .map_err(map_store_error)?;
            }
            Err(err) => return Err(map_store_error(err)),
        }
        Ok(())
    }
}

fn ignore_already_exists(err: StoreError) -> Result<omni_ctrl_store::StoredResource, StoreError> {
    match err {
        StoreError::AlreadyExists { namespace, kind, id } => Ok(omni_ctrl_store::StoredResource {
            meta: Meta::new(namespace, kind, id, 0),
            spec: serde_json::Value::Null,
        }),
        other => Err(other),
    }
}

fn ignore_not_found(err: StoreError) -> Result<omni_ctrl_store::StoredResource, StoreError> {
    match err {
        StoreError::NotFound { namespace, kind, id } => Ok(omni_ctrl_store::StoredResource {
            meta: Meta::new(namespace, kind, id, 0),
            spec: serde_json::Value::Null,
        }),
        other => Err(other),
    }
}

#[cfg(test)]
#[path = "machine_set_tests.rs"]
mod tests;
