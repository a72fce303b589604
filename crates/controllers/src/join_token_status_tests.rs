// SPDX-License-Identifier: MIT

use super::*;
use crate::store_ext::decode;
use omni_ctrl_core::ids::{ClusterId, JoinTokenId};
use omni_ctrl_core::resources::{ClusterSpec, JoinTokenSpec};
use omni_ctrl_core::FakeClock;
use omni_ctrl_store::shared;

async fn seed_cluster(store: &dyn Store, cluster: &ClusterId) {
    store
        .create(
            NAMESPACE,
            kinds::CLUSTER,
            cluster.as_str(),
            "test",
            encode(&Cluster {
                id: cluster.clone(),
                spec: ClusterSpec {
                    talos_version: "1.6.0".to_string(),
                    kubernetes_version: "1.29.0".to_string(),
                    feature_flags: Vec::new(),
                },
            }),
        )
        .await
        .unwrap();
}

async fn seed_token(store: &dyn Store, cluster: &ClusterId, expiration_ms: Option<u64>) {
    let id = JoinTokenId::new();
    store
        .create(
            NAMESPACE,
            kinds::JOIN_TOKEN,
            id.as_str(),
            "test",
            encode(&JoinToken {
                id,
                spec: JoinTokenSpec { cluster: cluster.clone(), expiration_ms },
            }),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn counts_active_and_expired_tokens_for_each_cluster() {
    let store: Arc<dyn Store> = shared(omni_ctrl_core::SystemClock);
    let clock = Arc::new(FakeClock::new());
    let cluster = ClusterId::new();
    seed_cluster(store.as_ref(), &cluster).await;
    seed_token(store.as_ref(), &cluster, None).await;
    seed_token(store.as_ref(), &cluster, Some(clock.epoch_ms() + 10_000)).await;
    seed_token(store.as_ref(), &cluster, Some(clock.epoch_ms())).await;

    let ctrl = JoinTokenStatusController::new(store.clone(), clock.clone());
    let outcome = ctrl.reconcile().await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Requeue(DEFAULT_CHECK_INTERVAL));

    let status: JoinTokenStatus = decode(&store.get(NAMESPACE, kinds::JOIN_TOKEN_STATUS, cluster.as_str()).await.unwrap()).unwrap();
    assert_eq!(status.active_tokens, 2);
    assert_eq!(status.expired_tokens, 1);
}

#[tokio::test]
async fn tokens_expire_once_the_clock_passes_their_deadline() {
    let store: Arc<dyn Store> = shared(omni_ctrl_core::SystemClock);
    let clock = Arc::new(FakeClock::new());
    let cluster = ClusterId::new();
    seed_cluster(store.as_ref(), &cluster).await;
    seed_token(store.as_ref(), &cluster, Some(clock.epoch_ms() + 1_000)).await;

    let ctrl = JoinTokenStatusController::new(store.clone(), clock.clone());
    ctrl.reconcile().await.unwrap();
    let status: JoinTokenStatus = decode(&store.get(NAMESPACE, kinds::JOIN_TOKEN_STATUS, cluster.as_str()).await.unwrap()).unwrap();
    assert_eq!(status.active_tokens, 1);
    assert_eq!(status.expired_tokens, 0);

    clock.advance(Duration::from_millis(1_000));
    ctrl.reconcile().await.unwrap();
    let status: JoinTokenStatus = decode(&store.get(NAMESPACE, kinds::JOIN_TOKEN_STATUS, cluster.as_str()).await.unwrap()).unwrap();
    assert_eq!(status.active_tokens, 0);
    assert_eq!(status.expired_tokens, 1);
}

#[tokio::test]
async fn tokens_for_other_clusters_are_not_counted() {
    let store: Arc<dyn Store> = shared(omni_ctrl_core::SystemClock);
    let clock = Arc::new(FakeClock::new());
    let cluster_a = ClusterId::new();
    let cluster_b = ClusterId::new();
    seed_cluster(store.as_ref(), &cluster_a).await;
    seed_cluster(store.as_ref(), &cluster_b).await;
    seed_token(store.as_ref(), &cluster_a, None).await;
    seed_token(store.as_ref(), &cluster_b, None).await;
    seed_token(store.as_ref(), &cluster_b, None).await;

    let ctrl = JoinTokenStatusController::new(store.clone(), clock.clone());
    ctrl.reconcile().await.unwrap();

    let status_a: JoinTokenStatus = decode(&store.get(NAMESPACE, kinds::JOIN_TOKEN_STATUS, cluster_a.as_str()).await.unwrap()).unwrap();
    let status_b: JoinTokenStatus = decode(&store.get(NAMESPACE, kinds::JOIN_TOKEN_STATUS, cluster_b.as_str()).await.unwrap()).unwrap();
    assert_eq!(status_a.active_tokens, 1);
    assert_eq!(status_b.active_tokens, 2);
}
