// SPDX-License-Identifier: MIT

//! Talos upgrade orchestrator (C6, spec.md 4.5): drives every
//! ClusterMachine in a cluster toward the cluster's desired Talos version
//! and each machine's most-specific desired schematic, serializing
//! control-plane rollout to one in-flight machine at a time.

use crate::config_patch_composer::{select_most_specific, PatchTarget};
use crate::kinds;
use crate::store_ext::{encode, get_optional, list_typed, map_store_error, NAMESPACE};
use async_trait::async_trait;
use omni_ctrl_core::ids::ClusterId;
use omni_ctrl_core::resources::{
    Cluster, ClusterMachine, ClusterMachineConfigStatus, ClusterMachineTalosVersion, ClusterStatus, MachineSet,
    MachineSetNode, MachineSetRole, MachineStatus, SchematicConfiguration, TalosUpgradePhase, TalosUpgradeStatus,
};
use omni_ctrl_core::{LabelQuery, Meta, Reconciled, ReconcileError};
use omni_ctrl_runtime::QController;
use omni_ctrl_store::{Store, StoreError};
use std::collections::HashMap;
use std::sync::Arc;

pub const OWNER: &str = "talos_upgrade_orchestrator";
/// Worker parallelism when its MachineSet carries no `update_strategy`
/// (spec.md 4.5: "workers follow the same parallelism cap as 4.3").
const DEFAULT_WORKER_PARALLELISM: u32 = 1;

pub struct TalosUpgradeController {
    pub store: Arc<dyn Store>,
}

struct MachineState {
    id: String,
    machine_set: String,
    role: MachineSetRole,
    locked: bool,
    current: Option<ClusterMachineTalosVersion>,
    config_status: Option<ClusterMachineConfigStatus>,
    desired_schematic: String,
}

#[async_trait]
impl QController for TalosUpgradeController {
    fn name(&self) -> &'static str {
        OWNER
    }

    async fn reconcile(&self, id: &str) -> Reconciled<ReconcileError> {
        self.reconcile_cluster(id).await
    }
}

impl TalosUpgradeController {
    async fn reconcile_cluster(&self, id: &str) -> Reconciled<ReconcileError> {
        let cluster_id: ClusterId = id.into();
        let Some((_, cluster)) = get_optional::<Cluster>(self.store.as_ref(), NAMESPACE, kinds::CLUSTER, id).await? else {
            return Ok(omni_ctrl_core::ReconcileOutcome::Ok);
        };

        let ready = get_optional::<ClusterStatus>(self.store.as_ref(), NAMESPACE, kinds::CLUSTER_STATUS, id)
            .await?
            .map(|(_, status)| status.ready)
            .unwrap_or(false);
        if !ready {
            self.write_status(id, TalosUpgradeStatus::waiting_for_ready(cluster_id)).await?;
            return Ok(omni_ctrl_core::ReconcileOutcome::Ok);
        }

        let mut cluster_machines: Vec<(Meta, ClusterMachine)> =
            list_typed::<ClusterMachine>(self.store.as_ref(), NAMESPACE, kinds::CLUSTER_MACHINE, &LabelQuery::new())
                .await?
                .into_iter()
                .filter(|(_, cm)| cm.spec.cluster == cluster_id)
                .collect();
        cluster_machines.sort_by(|a, b| a.1.id.as_str().cmp(b.1.id.as_str()));

        let schematics: Vec<SchematicConfiguration> =
            list_typed::<SchematicConfiguration>(self.store.as_ref(), NAMESPACE, kinds::SCHEMATIC_CONFIGURATION, &LabelQuery::new())
                .await?
                .into_iter()
                .map(|(_, s)| s)
                .collect();

        let mut machine_sets: HashMap<String, MachineSet> = HashMap::new();
        let mut machines = Vec::with_capacity(cluster_machines.len());
        for (_, cm) in &cluster_machines {
            let machine_set = match machine_sets.get(cm.spec.machine_set.as_str()) {
                Some(existing) => existing.clone(),
                None => {
                    let Some((_, fetched)) =
                        get_optional::<MachineSet>(self.store.as_ref(), NAMESPACE, kinds::MACHINE_SET, cm.spec.machine_set.as_str()).await?
                    else {
                        continue;
                    };
                    machine_sets.insert(cm.spec.machine_set.as_str().to_string(), fetched.clone());
                    fetched
                }
            };

            let locked = get_optional::<MachineSetNode>(self.store.as_ref(), NAMESPACE, kinds::MACHINE_SET_NODE, cm.id.as_str())
                .await?
                .map(|(_, n)| n.locked)
                .unwrap_or(false);

            let current = get_optional::<ClusterMachineTalosVersion>(self.store.as_ref(), NAMESPACE, kinds::CLUSTER_MACHINE_TALOS_VERSION, cm.id.as_str())
                .await?
                .map(|(_, v)| v);
            let config_status = get_optional::<ClusterMachineConfigStatus>(self.store.as_ref(), NAMESPACE, kinds::CLUSTER_MACHINE_CONFIG_STATUS, cm.id.as_str())
                .await?
                .map(|(_, s)| s);

            let target = PatchTarget {
                cluster: &cluster_id,
                machine_set: &cm.spec.machine_set,
                cluster_machine: &cm.id,
                machine: &cm.id,
            };
            let desired_schematic = match select_most_specific(&schematics, |s| s.id.as_str(), |s| &s.scope, &target) {
                Some(selected) => selected.schematic_id.clone(),
                None => get_optional::<MachineStatus>(self.store.as_ref(), NAMESPACE, kinds::MACHINE_STATUS, cm.id.as_str())
                    .await?
                    .and_then(|(_, s)| s.initial_schematic)
                    .unwrap_or_default(),
            };

            machines.push(MachineState {
                id: cm.id.as_str().to_string(),
                machine_set: cm.spec.machine_set.as_str().to_string(),
                role: machine_set.spec.role,
                locked,
                current,
                config_status,
                desired_schematic,
            });
        }

        let desired_version = cluster.spec.talos_version.clone();
        let total = machines.len();
        let mut done = 0usize;
        let mut cp_in_progress = 0usize;
        let mut cp_candidates = Vec::new();
        let mut worker_candidates = Vec::new();
        let mut maintenance_candidates = Vec::new();

        for machine in &machines {
            let matches_desired = machine
                .current
                .as_ref()
                .map(|v| v.talos_version == desired_version && v.schematic_id == machine.desired_schematic)
                .unwrap_or(false);
            if matches_desired {
                done += 1;
            }
            if machine.locked {
                continue;
            }
            let is_maintenance = machine.config_status.is_none();
            if !matches_desired {
                if is_maintenance {
                    maintenance_candidates.push(machine.id.clone());
                } else if machine.role == MachineSetRole::ControlPlane {
                    cp_candidates.push(machine.id.clone());
                } else {
                    worker_candidates.push(machine.id.clone());
                }
            } else if machine.role == MachineSetRole::ControlPlane {
                let applied = machine
                    .config_status
                    .as_ref()
                    .map(|s| s.talos_version == desired_version && s.schematic_id == machine.desired_schematic)
                    .unwrap_or(false);
                if !applied {
                    // Written but not yet observed applied: still non-terminal.
                    cp_in_progress += 1;
                }
            }
        }

        cp_candidates.sort();
        worker_candidates.sort();
        maintenance_candidates.sort();

        let mut selected = maintenance_candidates;
        if cp_in_progress == 0 {
            selected.extend(cp_candidates.into_iter().take(1));
        }
        for worker_id in select_up_to_worker_parallelism(&worker_candidates, &machines, &machine_sets) {
            selected.push(worker_id);
        }

        for machine_id in &selected {
            let machine = machines.iter().find(|m| &m.id == machine_id).expect("selected id is a known machine");
            let version = ClusterMachineTalosVersion {
                cluster_machine: machine_id.as_str().into(),
                talos_version: desired_version.clone(),
                schematic_id: machine.desired_schematic.clone(),
            };
            match self
                .store
                .create(NAMESPACE, kinds::CLUSTER_MACHINE_TALOS_VERSION, machine_id, OWNER, encode(&version))
                .await
            {
                Ok(_) => {}
                Err(StoreError::AlreadyExists { .. }) => {
                    let version = version.clone();
                    self.store
                        .update_with_conflicts(
                            NAMESPACE,
                            kinds::CLUSTER_MACHINE_TALOS_VERSION,
                            machine_id,
                            OWNER,
                            Box::new(move |_meta, spec| {
                                *spec = encode(&version);
                                Ok(())
                            }),
                        )
                        .await
                        .map_err(map_store_error)?;
                }
                Err(err) => return Err(map_store_error(err)),
            }
        }

        done = (done + selected.len()).min(total);

        let status = if total > 0 && done >= total {
            TalosUpgradeStatus::done(cluster_id, desired_version)
        } else {
            TalosUpgradeStatus::updating(cluster_id, done, total)
        };
        self.write_status(id, status).await?;
        Ok(omni_ctrl_core::ReconcileOutcome::Ok)
    }

    async fn write_status(&self, cluster_id: &str, status: TalosUpgradeStatus) -> Result<(), ReconcileError> {
        match self.store.get(NAMESPACE, kinds::TALOS_UPGRADE_STATUS, cluster_id).await {
            Ok(_) => {
                self.store
                    .update_with_conflicts(
                        NAMESPACE,
                        kinds::TALOS_UPGRADE_STATUS,
                        cluster_id,
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
                    .create(NAMESPACE, kinds::TALOS_UPGRADE_STATUS, cluster_id, OWNER, encode(&status))
                    .await
                    .map_err(map_store_error)?;
            }
            Err(err) => return Err(map_store_error(err)),
        }
        Ok(())
    }
}

/// Caps outdated worker candidates per MachineSet at that set's own
/// `update_strategy.max_parallelism()`, falling back to
/// `DEFAULT_WORKER_PARALLELISM` when unset (spec.md 4.5).
fn select_up_to_worker_parallelism(
    candidates: &[String],
    machines: &[MachineState],
    machine_sets: &HashMap<String, MachineSet>,
) -> Vec<String> {
    let mut taken_per_set: HashMap<&str, u32> = HashMap::new();
    let mut selected = Vec::new();
    for id in candidates {
        let Some(machine) = machines.iter().find(|m| &m.id == id) else {
            continue;
        };
        let cap = machine_sets
            .get(machine.machine_set.as_str())
            .and_then(|set| set.spec.update_strategy.max_parallelism())
            .unwrap_or(DEFAULT_WORKER_PARALLELISM);
        let taken = taken_per_set.entry(machine.machine_set.as_str()).or_insert(0);
        if *taken < cap {
            *taken += 1;
            selected.push(id.clone());
        }
    }
    selected
}

#[cfg(test)]
#[path = "talos_upgrade_tests.rs"]
mod tests;
