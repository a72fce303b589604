// SPDX-License-Identifier: MIT

use super::*;
use crate::store_ext::decode;
use omni_ctrl_core::FakeClock;
use omni_ctrl_store::shared;

const RAW_YAML: &str = "machine:\n  token: abc123\n  ca:\n    crt: Y2VydA==\n    key: a2V5\ncluster:\n  secret: sekret\n";

#[test]
fn redact_yaml_masks_secrets_but_preserves_certificates() {
    let redacted = redact_yaml(RAW_YAML);
    assert!(redacted.contains("token: '******'"));
    assert!(redacted.contains("secret: '******'"));
    assert!(redacted.contains("key: '******'"));
    assert!(redacted.contains("crt: Y2VydA=="), "certificate data must survive redaction");
}

#[tokio::test]
async fn first_reconcile_creates_the_redacted_mirror_without_a_diff() {
    let store: Arc<dyn Store> = shared(omni_ctrl_core::SystemClock);
    let clock = Arc::new(FakeClock::new());
    store
        .create(
            NAMESPACE,
            kinds::CLUSTER_MACHINE_CONFIG,
            "m-1",
            "test",
            encode(&ClusterMachineConfig { machine: "m-1".into(), yaml: RAW_YAML.to_string() }),
        )
        .await
        .unwrap();

    let ctrl = RedactedConfigController::new(store.clone(), clock);
    ctrl.reconcile("m-1").await.unwrap();

    let redacted: RedactedClusterMachineConfig = decode(&store.get(NAMESPACE, kinds::REDACTED_CLUSTER_MACHINE_CONFIG, "m-1").await.unwrap()).unwrap();
    assert!(redacted.yaml.contains("token: '******'"));

    let diffs = list_typed::<MachineConfigDiff>(store.as_ref(), NAMESPACE, kinds::MACHINE_CONFIG_DIFF, &LabelQuery::new()).await.unwrap();
    assert!(diffs.is_empty(), "no diff on initial creation");
}

#[tokio::test]
async fn a_change_to_the_raw_config_produces_exactly_one_diff() {
    let store: Arc<dyn Store> = shared(omni_ctrl_core::SystemClock);
    let clock = Arc::new(FakeClock::new());
    store
        .create(
            NAMESPACE,
            kinds::CLUSTER_MACHINE_CONFIG,
            "m-1",
            "test",
            encode(&ClusterMachineConfig { machine: "m-1".into(), yaml: "cluster:\n  secret: one\n".to_string() }),
        )
        .await
        .unwrap();
    let ctrl = RedactedConfigController::new(store.clone(), clock.clone());
    ctrl.reconcile("m-1").await.unwrap();

    store
        .update_with_conflicts(
            NAMESPACE,
            kinds::CLUSTER_MACHINE_CONFIG,
            "m-1",
            "test",
            Box::new(|_meta, spec| {
                if let Some(obj) = spec.as_object_mut() {
                    obj.insert("yaml".to_string(), serde_json::json!("cluster:\n  secret: two\n"));
                }
                Ok(())
            }),
        )
        .await
        .unwrap();
    clock.advance(Duration::from_secs(1));
    ctrl.reconcile("m-1").await.unwrap();

    let diffs = list_typed::<MachineConfigDiff>(store.as_ref(), NAMESPACE, kinds::MACHINE_CONFIG_DIFF, &LabelQuery::new()).await.unwrap();
    assert_eq!(diffs.len(), 1);
    assert!(diffs[0].1.id.starts_with("m-1-"));
}

#[tokio::test]
async fn reconcile_is_a_skip_when_the_redacted_output_is_unchanged() {
    let store: Arc<dyn Store> = shared(omni_ctrl_core::SystemClock);
    let clock = Arc::new(FakeClock::new());
    store
        .create(
            NAMESPACE,
            kinds::CLUSTER_MACHINE_CONFIG,
            "m-1",
            "test",
            encode(&ClusterMachineConfig { machine: "m-1".into(), yaml: RAW_YAML.to_string() }),
        )
        .await
        .unwrap();
    let ctrl = RedactedConfigController::new(store.clone(), clock);
    ctrl.reconcile("m-1").await.unwrap();

    let outcome = ctrl.reconcile("m-1").await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Skip);
}

#[tokio::test]
async fn destroying_the_raw_config_removes_the_mirror_and_its_diffs() {
    let store: Arc<dyn Store> = shared(omni_ctrl_core::SystemClock);
    let clock = Arc::new(FakeClock::new());
    store
        .create(
            NAMESPACE,
            kinds::CLUSTER_MACHINE_CONFIG,
            "m-1",
            "test",
            encode(&ClusterMachineConfig { machine: "m-1".into(), yaml: "cluster:\n  secret: one\n".to_string() }),
        )
        .await
        .unwrap();
    let ctrl = RedactedConfigController::new(store.clone(), clock.clone());
    ctrl.reconcile("m-1").await.unwrap();
    store
        .update_with_conflicts(
            NAMESPACE,
            kinds::CLUSTER_MACHINE_CONFIG,
            "m-1",
            "test",
            Box::new(|_meta, spec| {
                if let Some(obj) = spec.as_object_mut() {
                    obj.insert("yaml".to_string(), serde_json::json!("cluster:\n  secret: two\n"));
                }
                Ok(())
            }),
        )
        .await
        .unwrap();
    ctrl.reconcile("m-1").await.unwrap();
    assert_eq!(
        list_typed::<MachineConfigDiff>(store.as_ref(), NAMESPACE, kinds::MACHINE_CONFIG_DIFF, &LabelQuery::new()).await.unwrap().len(),
        1
    );

    store.teardown(NAMESPACE, kinds::CLUSTER_MACHINE_CONFIG, "m-1", "test").await.unwrap();
    store.destroy(NAMESPACE, kinds::CLUSTER_MACHINE_CONFIG, "m-1", "test").await.unwrap();
    ctrl.reconcile("m-1").await.unwrap();

    assert!(matches!(
        store.get(NAMESPACE, kinds::REDACTED_CLUSTER_MACHINE_CONFIG, "m-1").await,
        Err(omni_ctrl_store::StoreError::NotFound { .. })
    ));
    assert!(list_typed::<MachineConfigDiff>(store.as_ref(), NAMESPACE, kinds::MACHINE_CONFIG_DIFF, &LabelQuery::new())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn prune_drops_diffs_older_than_the_age_cap() {
    let store: Arc<dyn Store> = shared(omni_ctrl_core::SystemClock);
    let clock = Arc::new(FakeClock::new());
    let machine: MachineId = "m-1".into();
    store
        .create(
            NAMESPACE,
            kinds::MACHINE_CONFIG_DIFF,
            "m-1-old",
            OWNER,
            encode(&MachineConfigDiff { id: "m-1-old".to_string(), machine: machine.clone(), created_at_ms: 0, unified_diff: String::new() }),
        )
        .await
        .unwrap();

    clock.advance(Duration::from_secs(20 * 60));
    let prune = RedactedConfigPruneController::new(store.clone(), clock.clone());
    prune.reconcile().await.unwrap();

    assert!(matches!(
        store.get(NAMESPACE, kinds::MACHINE_CONFIG_DIFF, "m-1-old").await,
        Err(omni_ctrl_store::StoreError::NotFound { .. })
    ));
}

#[tokio::test]
async fn prune_keeps_at_most_the_count_cap_per_machine() {
    let store: Arc<dyn Store> = shared(omni_ctrl_core::SystemClock);
    let clock = Arc::new(FakeClock::new());
    let machine: MachineId = "m-1".into();
    for i in 0..4u64 {
        store
            .create(
                NAMESPACE,
                kinds::MACHINE_CONFIG_DIFF,
                &format!("m-1-{i}"),
                OWNER,
                encode(&MachineConfigDiff {
                    id: format!("m-1-{i}"),
                    machine: machine.clone(),
                    created_at_ms: i * 1000,
                    unified_diff: String::new(),
                }),
            )
            .await
            .unwrap();
    }

    let prune = RedactedConfigPruneController::new(store.clone(), clock.clone());
    prune.reconcile().await.unwrap();

    let remaining = list_typed::<MachineConfigDiff>(store.as_ref(), NAMESPACE, kinds::MACHINE_CONFIG_DIFF, &LabelQuery::new()).await.unwrap();
    assert_eq!(remaining.len(), DEFAULT_DIFF_MAX_COUNT);
    let ids: Vec<_> = remaining.iter().map(|(_, d)| d.id.clone()).collect();
    assert!(ids.contains(&"m-1-3".to_string()));
    assert!(ids.contains(&"m-1-2".to_string()));
}
