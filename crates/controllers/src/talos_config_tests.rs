// SPDX-License-Identifier: MIT

use super::*;
use crate::store_ext::decode;
use omni_ctrl_adapters::cert::fake::FakeCertMinter;
use omni_ctrl_core::ids::ClusterId;
use omni_ctrl_core::FakeClock;
use omni_ctrl_store::shared;

const LIFETIME_MS: u64 = 10_000;

fn ok_state(cluster: ClusterId) -> ClusterCaState {
    ClusterCaState {
        cluster,
        phase: CaRotationPhase::Ok,
        current_ca: "ca-1".to_string(),
        new_ca: None,
    }
}

async fn seed_cluster(store: &dyn Store, cluster: &ClusterId) {
    store
        .create(
            NAMESPACE,
            kinds::CLUSTER,
            cluster.as_str(),
            "test",
            encode(&Cluster {
                id: cluster.clone(),
                spec: omni_ctrl_core::resources::ClusterSpec {
                    talos_version: "1.6.0".to_string(),
                    kubernetes_version: "1.29.0".to_string(),
                    feature_flags: Vec::new(),
                },
            }),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn mints_a_cert_when_none_exists_yet() {
    let store: Arc<dyn Store> = shared(omni_ctrl_core::SystemClock);
    let clock = Arc::new(FakeClock::new());
    let minter = Arc::new(FakeCertMinter::new(LIFETIME_MS));
    let cluster = ClusterId::new();
    seed_cluster(store.as_ref(), &cluster).await;
    store
        .create(NAMESPACE, kinds::CLUSTER_CA_STATE, cluster.as_str(), "test", encode(&ok_state(cluster.clone())))
        .await
        .unwrap();

    let ctrl = TalosConfigController::new(store.clone(), clock.clone(), minter);
    ctrl.reconcile().await.unwrap();

    let config: TalosConfig = decode(&store.get(NAMESPACE, kinds::TALOS_CONFIG, cluster.as_str()).await.unwrap()).unwrap();
    assert_eq!(config.signing_ca, "ca-1");
    assert_eq!(config.ca, vec!["ca-1".to_string()]);
    assert_eq!(config.cert_issued_at_ms, clock.epoch_ms());
    assert_eq!(config.cert_lifetime_ms, LIFETIME_MS);
}

#[tokio::test]
async fn does_not_remint_before_half_lifetime_has_elapsed() {
    let store: Arc<dyn Store> = shared(omni_ctrl_core::SystemClock);
    let clock = Arc::new(FakeClock::new());
    let minter = Arc::new(FakeCertMinter::new(LIFETIME_MS));
    let cluster = ClusterId::new();
    seed_cluster(store.as_ref(), &cluster).await;
    store
        .create(NAMESPACE, kinds::CLUSTER_CA_STATE, cluster.as_str(), "test", encode(&ok_state(cluster.clone())))
        .await
        .unwrap();

    let ctrl = TalosConfigController::new(store.clone(), clock.clone(), minter);
    ctrl.reconcile().await.unwrap();
    let first_version = store.get(NAMESPACE, kinds::TALOS_CONFIG, cluster.as_str()).await.unwrap().meta.version;

    clock.advance(Duration::from_millis(LIFETIME_MS / 4));
    ctrl.reconcile().await.unwrap();
    let second_version = store.get(NAMESPACE, kinds::TALOS_CONFIG, cluster.as_str()).await.unwrap().meta.version;

    assert_eq!(first_version, second_version, "no remint before 50% of lifetime");
}

#[tokio::test]
async fn remints_once_past_half_lifetime() {
    let store: Arc<dyn Store> = shared(omni_ctrl_core::SystemClock);
    let clock = Arc::new(FakeClock::new());
    let minter = Arc::new(FakeCertMinter::new(LIFETIME_MS));
    let cluster = ClusterId::new();
    seed_cluster(store.as_ref(), &cluster).await;
    store
        .create(NAMESPACE, kinds::CLUSTER_CA_STATE, cluster.as_str(), "test", encode(&ok_state(cluster.clone())))
        .await
        .unwrap();

    let ctrl = TalosConfigController::new(store.clone(), clock.clone(), minter);
    ctrl.reconcile().await.unwrap();

    clock.advance(Duration::from_millis(LIFETIME_MS / 2 + 1));
    ctrl.reconcile().await.unwrap();

    let config: TalosConfig = decode(&store.get(NAMESPACE, kinds::TALOS_CONFIG, cluster.as_str()).await.unwrap()).unwrap();
    assert_eq!(config.cert_issued_at_ms, clock.epoch_ms());
}

#[tokio::test]
async fn pre_rotate_phase_trusts_both_cas_but_signs_with_the_old_one() {
    let store: Arc<dyn Store> = shared(omni_ctrl_core::SystemClock);
    let clock = Arc::new(FakeClock::new());
    let minter = Arc::new(FakeCertMinter::new(LIFETIME_MS));
    let cluster = ClusterId::new();
    seed_cluster(store.as_ref(), &cluster).await;
    let state = ClusterCaState {
        cluster: cluster.clone(),
        phase: CaRotationPhase::PreRotate,
        current_ca: "ca-old".to_string(),
        new_ca: Some("ca-new".to_string()),
    };
    store.create(NAMESPACE, kinds::CLUSTER_CA_STATE, cluster.as_str(), "test", encode(&state)).await.unwrap();

    let ctrl = TalosConfigController::new(store.clone(), clock.clone(), minter);
    ctrl.reconcile().await.unwrap();

    let config: TalosConfig = decode(&store.get(NAMESPACE, kinds::TALOS_CONFIG, cluster.as_str()).await.unwrap()).unwrap();
    assert_eq!(config.signing_ca, "ca-old");
    assert_eq!(config.ca, vec!["ca-old".to_string(), "ca-new".to_string()]);
}

#[tokio::test]
async fn rotate_phase_switches_signing_to_the_new_ca_and_remints_immediately() {
    let store: Arc<dyn Store> = shared(omni_ctrl_core::SystemClock);
    let clock = Arc::new(FakeClock::new());
    let minter = Arc::new(FakeCertMinter::new(LIFETIME_MS));
    let cluster = ClusterId::new();
    seed_cluster(store.as_ref(), &cluster).await;
    store
        .create(NAMESPACE, kinds::CLUSTER_CA_STATE, cluster.as_str(), "test", encode(&ok_state(cluster.clone())))
        .await
        .unwrap();

    let ctrl = TalosConfigController::new(store.clone(), clock.clone(), minter);
    ctrl.reconcile().await.unwrap();

    let rotated = ClusterCaState {
        cluster: cluster.clone(),
        phase: CaRotationPhase::Rotate,
        current_ca: "ca-1".to_string(),
        new_ca: Some("ca-2".to_string()),
    };
    store
        .update_with_conflicts(
            NAMESPACE,
            kinds::CLUSTER_CA_STATE,
            cluster.as_str(),
            "test",
            Box::new(move |_meta, spec| {
                *spec = encode(&rotated);
                Ok(())
            }),
        )
        .await
        .unwrap();

    ctrl.reconcile().await.unwrap();

    let config: TalosConfig = decode(&store.get(NAMESPACE, kinds::TALOS_CONFIG, cluster.as_str()).await.unwrap()).unwrap();
    assert_eq!(config.signing_ca, "ca-2");
    assert_eq!(config.ca, vec!["ca-1".to_string(), "ca-2".to_string()]);
}

#[tokio::test]
async fn clusters_without_ca_state_are_skipped() {
    let store: Arc<dyn Store> = shared(omni_ctrl_core::SystemClock);
    let clock = Arc::new(FakeClock::new());
    let minter = Arc::new(FakeCertMinter::new(LIFETIME_MS));
    let cluster = ClusterId::new();
    seed_cluster(store.as_ref(), &cluster).await;

    let ctrl = TalosConfigController::new(store.clone(), clock.clone(), minter);
    let outcome = ctrl.reconcile().await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Requeue(DEFAULT_CHECK_INTERVAL));
    assert!(matches!(
        store.get(NAMESPACE, kinds::TALOS_CONFIG, cluster.as_str()).await,
        Err(omni_ctrl_store::StoreError::NotFound { .. })
    ));
}
