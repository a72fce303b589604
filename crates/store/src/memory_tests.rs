// SPDX-License-Identifier: MIT

use super::*;
use omni_ctrl_core::FakeClock;
use serde_json::json;

fn store() -> InMemoryStore<FakeClock> {
    InMemoryStore::new(FakeClock::new())
}

#[tokio::test]
async fn create_then_get_round_trips() {
    let s = store();
    s.create("default", "Cluster", "c1", "cluster-ctrl", json!({"talos_version": "1.3.0"}))
        .await
        .unwrap();
    let got = s.get("default", "Cluster", "c1").await.unwrap();
    assert_eq!(got.meta.owner, "cluster-ctrl");
    assert_eq!(got.spec["talos_version"], "1.3.0");
}

#[tokio::test]
async fn create_twice_conflicts() {
    let s = store();
    s.create("default", "Cluster", "c1", "owner", json!({})).await.unwrap();
    let err = s.create("default", "Cluster", "c1", "owner", json!({})).await.unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists { .. }));
}

#[tokio::test]
async fn get_missing_is_not_found() {
    let s = store();
    let err = s.get("default", "Cluster", "missing").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn update_by_non_owner_is_rejected() {
    let s = store();
    s.create("default", "Cluster", "c1", "owner-a", json!({"v": 1}))
        .await
        .unwrap();
    let err = s
        .update_with_conflicts(
            "default",
            "Cluster",
            "c1",
            "owner-b",
            Box::new(|_meta, spec| {
                spec["v"] = json!(2);
                Ok(())
            }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::OwnerConflict { .. }));
}

#[tokio::test]
async fn update_bumps_version_and_touches_updated_at() {
    let s = store();
    s.create("default", "Cluster", "c1", "owner", json!({"v": 1}))
        .await
        .unwrap();
    let before = s.get("default", "Cluster", "c1").await.unwrap();
    let updated = s
        .update_with_conflicts(
            "default",
            "Cluster",
            "c1",
            "owner",
            Box::new(|_meta, spec| {
                spec["v"] = json!(2);
                Ok(())
            }),
        )
        .await
        .unwrap();
    assert_eq!(updated.meta.version, before.meta.version + 1);
    assert_eq!(updated.spec["v"], 2);
}

#[tokio::test]
async fn destroy_requires_teardown_first() {
    let s = store();
    s.create("default", "Cluster", "c1", "owner", json!({})).await.unwrap();
    let err = s.destroy("default", "Cluster", "c1", "owner").await.unwrap_err();
    assert!(matches!(err, StoreError::NotReady { .. }));

    s.teardown("default", "Cluster", "c1", "owner").await.unwrap();
    s.destroy("default", "Cluster", "c1", "owner").await.unwrap();
    assert!(s.get("default", "Cluster", "c1").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn destroy_blocked_while_finalizer_outstanding() {
    let s = store();
    s.create("default", "Cluster", "c1", "owner", json!({})).await.unwrap();
    s.add_finalizer("default", "Cluster", "c1", "machine-set").await.unwrap();
    s.teardown("default", "Cluster", "c1", "owner").await.unwrap();
    let err = s.destroy("default", "Cluster", "c1", "owner").await.unwrap_err();
    assert!(matches!(err, StoreError::NotReady { .. }));

    s.remove_finalizer("default", "Cluster", "c1", "machine-set")
        .await
        .unwrap();
    s.destroy("default", "Cluster", "c1", "owner").await.unwrap();
}

#[tokio::test]
async fn destroy_missing_resource_is_idempotent() {
    let s = store();
    s.destroy("default", "Cluster", "missing", "owner").await.unwrap();
}

#[tokio::test]
async fn list_filters_by_label_query() {
    let s = store();
    let key_a = s
        .create("default", "ClusterMachine", "m1", "owner", json!({}))
        .await
        .unwrap();
    s.update_with_conflicts(
        "default",
        "ClusterMachine",
        "m1",
        "owner",
        Box::new(|meta, _spec| {
            meta.labels.insert("cluster".into(), "c1".into());
            Ok(())
        }),
    )
    .await
    .unwrap();
    s.create("default", "ClusterMachine", "m2", "owner", json!({})).await.unwrap();
    let _ = key_a;

    let matched = s
        .list("default", "ClusterMachine", &LabelQuery::new().with("cluster", "c1"))
        .await
        .unwrap();
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].meta.id, "m1");
}

#[tokio::test]
async fn watch_kind_observes_create_update_teardown() {
    let s = store();
    let mut rx = s.watch_kind("default", "Cluster");
    s.create("default", "Cluster", "c1", "owner", json!({})).await.unwrap();
    assert!(matches!(rx.recv().await.unwrap(), WatchEvent::Created(_)));

    s.update_with_conflicts("default", "Cluster", "c1", "owner", Box::new(|_, _| Ok(())))
        .await
        .unwrap();
    assert!(matches!(rx.recv().await.unwrap(), WatchEvent::Updated(_)));

    s.teardown("default", "Cluster", "c1", "owner").await.unwrap();
    assert!(matches!(rx.recv().await.unwrap(), WatchEvent::TearingDown(_)));

    s.destroy("default", "Cluster", "c1", "owner").await.unwrap();
    assert!(matches!(rx.recv().await.unwrap(), WatchEvent::Destroyed { .. }));
}
