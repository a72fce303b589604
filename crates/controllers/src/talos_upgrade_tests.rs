// SPDX-License-Identifier: MIT

use super::*;
use crate::store_ext::decode;
use omni_ctrl_core::resources::{
    ClusterMachineSpec, ClusterSpec, DeleteStrategy, MachineCountMode, MachineSetNodeSpec, MachineSetSpec,
    UpdateStrategy,
};
use omni_ctrl_core::SystemClock;
use omni_ctrl_store::shared;

fn controller(store: Arc<dyn Store>) -> TalosUpgradeController {
    TalosUpgradeController { store }
}

async fn seed_cluster(store: &Arc<dyn Store>, id: &str, talos_version: &str, ready: bool) {
    store
        .create(
            NAMESPACE,
            kinds::CLUSTER,
            id,
            "client",
            encode(&ClusterSpec {
                talos_version: talos_version.to_string(),
                kubernetes_version: "1.30.0".to_string(),
                feature_flags: vec![],
            }),
        )
        .await
        .unwrap();
    store
        .create(NAMESPACE, kinds::CLUSTER_STATUS, id, "client", encode(&ClusterStatus { cluster: id.into(), ready }))
        .await
        .unwrap();
}

async fn seed_machine_set(store: &Arc<dyn Store>, id: &str, cluster: &str, role: MachineSetRole) {
    store
        .create(
            NAMESPACE,
            kinds::MACHINE_SET,
            id,
            "client",
            encode(&MachineSetSpec {
                cluster: cluster.into(),
                role,
                update_strategy: UpdateStrategy::Unset,
                delete_strategy: DeleteStrategy::Unset,
                machine_count_mode: MachineCountMode::FromNodes,
            }),
        )
        .await
        .unwrap();
}

async fn seed_cluster_machine(store: &Arc<dyn Store>, id: &str, cluster: &str, machine_set: &str) {
    store
        .create(
            NAMESPACE,
            kinds::CLUSTER_MACHINE,
            id,
            "client",
            encode(&ClusterMachine {
                id: id.into(),
                version: 1,
                spec: ClusterMachineSpec {
                    cluster: cluster.into(),
                    machine_set: machine_set.into(),
                },
            }),
        )
        .await
        .unwrap();
}

async fn seed_config_status(store: &Arc<dyn Store>, machine: &str, talos_version: &str, schematic_id: &str) {
    store
        .create(
            NAMESPACE,
            kinds::CLUSTER_MACHINE_CONFIG_STATUS,
            machine,
            "client",
            encode(&ClusterMachineConfigStatus {
                config_sha: "sha".to_string(),
                talos_version: talos_version.to_string(),
                schematic_id: schematic_id.to_string(),
                last_error: String::new(),
                apply_status: omni_ctrl_core::resources::ApplyStatus::Applied,
                cluster_machine_version: Some(1),
            }),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn waits_when_cluster_status_is_not_ready() {
    let store: Arc<dyn Store> = shared(SystemClock);
    seed_cluster(&store, "clu-1", "1.3.6", false).await;

    let ctrl = controller(store.clone());
    ctrl.reconcile("clu-1").await.unwrap();

    let status: TalosUpgradeStatus = decode(&store.get(NAMESPACE, kinds::TALOS_UPGRADE_STATUS, "clu-1").await.unwrap()).unwrap();
    assert_eq!(status.phase, TalosUpgradePhase::Upgrading);
    assert_eq!(status.status, "waiting for the cluster to be ready");
}

#[tokio::test]
async fn rolling_upgrade_serializes_control_plane_and_caps_workers_at_one() {
    let store: Arc<dyn Store> = shared(SystemClock);
    seed_cluster(&store, "clu-1", "1.3.6", true).await;
    seed_machine_set(&store, "mst-cp", "clu-1", MachineSetRole::ControlPlane).await;
    seed_machine_set(&store, "mst-wk", "clu-1", MachineSetRole::Worker).await;

    for id in ["mch-1", "mch-2", "mch-3"] {
        seed_cluster_machine(&store, id, "clu-1", "mst-cp").await;
        seed_config_status(&store, id, "1.3.0", "").await;
    }
    seed_cluster_machine(&store, "mch-4", "clu-1", "mst-wk").await;
    seed_config_status(&store, "mch-4", "1.3.0", "").await;

    let ctrl = controller(store.clone());
    ctrl.reconcile("clu-1").await.unwrap();

    let cp_versions: Vec<_> = written_versions(&store, &["mch-1", "mch-2", "mch-3"]).await;
    assert_eq!(cp_versions.iter().filter(|v| v.is_some()).count(), 1, "at most one control-plane machine in flight (P3)");

    let worker_version: Option<ClusterMachineTalosVersion> = get_optional(store.as_ref(), NAMESPACE, kinds::CLUSTER_MACHINE_TALOS_VERSION, "mch-4")
        .await
        .unwrap()
        .map(|(_, v)| v);
    assert!(worker_version.is_some());

    let status: TalosUpgradeStatus = decode(&store.get(NAMESPACE, kinds::TALOS_UPGRADE_STATUS, "clu-1").await.unwrap()).unwrap();
    assert_eq!(status.phase, TalosUpgradePhase::Upgrading);
    assert_eq!(status.status, "updating machines 2/4");
}

async fn written_versions(store: &Arc<dyn Store>, ids: &[&str]) -> Vec<Option<ClusterMachineTalosVersion>> {
    let mut out = Vec::new();
    for id in ids {
        out.push(
            get_optional::<ClusterMachineTalosVersion>(store.as_ref(), NAMESPACE, kinds::CLUSTER_MACHINE_TALOS_VERSION, id)
                .await
                .unwrap()
                .map(|(_, v)| v),
        );
    }
    out
}

#[tokio::test]
async fn locked_machine_is_never_selected_for_upgrade() {
    let store: Arc<dyn Store> = shared(SystemClock);
    seed_cluster(&store, "clu-1", "1.3.6", true).await;
    seed_machine_set(&store, "mst-wk", "clu-1", MachineSetRole::Worker).await;
    seed_cluster_machine(&store, "mch-1", "clu-1", "mst-wk").await;
    seed_config_status(&store, "mch-1", "1.3.0", "").await;
    store
        .create(
            NAMESPACE,
            kinds::MACHINE_SET_NODE,
            "mch-1",
            "client",
            encode(&MachineSetNode {
                id: "mch-1".into(),
                machine_set: "mst-wk".into(),
                spec: MachineSetNodeSpec { node_name: "mch-1".to_string() },
                locked: true,
            }),
        )
        .await
        .unwrap();

    let ctrl = controller(store.clone());
    ctrl.reconcile("clu-1").await.unwrap();

    let written = store.get(NAMESPACE, kinds::CLUSTER_MACHINE_TALOS_VERSION, "mch-1").await;
    assert!(written.is_err(), "locked machines must not be touched (P4)");
}

#[tokio::test]
async fn maintenance_machines_bypass_the_control_plane_serialization_gate() {
    let store: Arc<dyn Store> = shared(SystemClock);
    seed_cluster(&store, "clu-1", "1.3.6", true).await;
    seed_machine_set(&store, "mst-cp", "clu-1", MachineSetRole::ControlPlane).await;
    seed_cluster_machine(&store, "mch-1", "clu-1", "mst-cp").await;
    seed_config_status(&store, "mch-1", "1.3.0", "").await;
    // mch-2 has no ClusterMachineConfigStatus at all: still provisioning.
    seed_cluster_machine(&store, "mch-2", "clu-1", "mst-cp").await;

    let ctrl = controller(store.clone());
    ctrl.reconcile("clu-1").await.unwrap();

    assert!(store.get(NAMESPACE, kinds::CLUSTER_MACHINE_TALOS_VERSION, "mch-2").await.is_ok());
}

#[tokio::test]
async fn marks_upgrade_done_once_every_machine_matches_desired_version() {
    let store: Arc<dyn Store> = shared(SystemClock);
    seed_cluster(&store, "clu-1", "1.3.6", true).await;
    seed_machine_set(&store, "mst-wk", "clu-1", MachineSetRole::Worker).await;
    seed_cluster_machine(&store, "mch-1", "clu-1", "mst-wk").await;
    store
        .create(
            NAMESPACE,
            kinds::CLUSTER_MACHINE_TALOS_VERSION,
            "mch-1",
            OWNER,
            encode(&ClusterMachineTalosVersion {
                cluster_machine: "mch-1".into(),
                talos_version: "1.3.6".to_string(),
                schematic_id: String::new(),
            }),
        )
        .await
        .unwrap();
    seed_config_status(&store, "mch-1", "1.3.6", "").await;

    let ctrl = controller(store.clone());
    ctrl.reconcile("clu-1").await.unwrap();

    let status: TalosUpgradeStatus = decode(&store.get(NAMESPACE, kinds::TALOS_UPGRADE_STATUS, "clu-1").await.unwrap()).unwrap();
    assert_eq!(status.phase, TalosUpgradePhase::Done);
    assert_eq!(status.last_upgrade_version.as_deref(), Some("1.3.6"));
}
