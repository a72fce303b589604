// SPDX-License-Identifier: MIT

use super::*;
use crate::controller::Controller;
use crate::qcontroller::QController;
use async_trait::async_trait;
use omni_ctrl_core::{Reconciled, ReconcileOutcome, SystemClock};
use omni_ctrl_store::shared;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

struct CountingController(Arc<AtomicUsize>);

#[async_trait]
impl Controller for CountingController {
    fn name(&self) -> &'static str {
        "counting"
    }
    async fn reconcile(&self) -> Reconciled<ReconcileError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(ReconcileOutcome::Ok)
    }
}

#[tokio::test]
async fn plain_controller_wakes_on_store_events() {
    let store = shared(SystemClock);
    let mut runtime = ControllerRuntime::new(store.clone());
    let calls = Arc::new(AtomicUsize::new(0));
    runtime.spawn_controller(Arc::new(CountingController(calls.clone())), "default", "Cluster");
    let cancel = runtime.cancellation_token();
    let handle = tokio::spawn(runtime.run());

    store.create("default", "Cluster", "clu-1", "owner", json!({})).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    cancel.cancel();
    handle.await.unwrap().unwrap();

    assert!(calls.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn periodic_controller_self_schedules_without_any_watch_event() {
    let store = shared(SystemClock);
    let mut runtime = ControllerRuntime::new(store.clone());
    let calls = Arc::new(AtomicUsize::new(0));
    runtime.spawn_periodic(Arc::new(CountingController(calls.clone())));
    let cancel = runtime.cancellation_token();
    let handle = tokio::spawn(runtime.run());

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    cancel.cancel();
    handle.await.unwrap().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

struct RecordingQController(Mutex<Vec<String>>);

#[async_trait]
impl QController for RecordingQController {
    fn name(&self) -> &'static str {
        "recording"
    }
    async fn reconcile(&self, id: &str) -> Reconciled<ReconcileError> {
        self.0.lock().push(id.to_string());
        Ok(ReconcileOutcome::Ok)
    }
}

#[tokio::test]
async fn qcontroller_extra_input_maps_to_primary_id() {
    let store = shared(SystemClock);
    store
        .create("default", "MachineSet", "mst-1", "owner", json!({}))
        .await
        .unwrap();

    let mut runtime = ControllerRuntime::new(store.clone());
    let controller = Arc::new(RecordingQController(Mutex::new(vec![])));

    let mapper: InputMapper = Arc::new(|event| match event {
        WatchEvent::Created(r) | WatchEvent::Updated(r) => {
            vec![r.meta.label("omni-ctrl.dev/machine-set").unwrap_or_default().to_string()]
        }
        _ => vec![],
    });

    runtime.spawn_qcontroller(
        controller.clone(),
        1,
        "default",
        "MachineSet",
        vec![ExtraInput {
            namespace: "default".into(),
            kind: "ClusterMachine".into(),
            mapper,
        }],
    );

    let cancel = runtime.cancellation_token();
    let handle = tokio::spawn(runtime.run());

    let mut spec = std::collections::BTreeMap::new();
    spec.insert("omni-ctrl.dev/machine-set".to_string(), "mst-1".to_string());
    store
        .update_with_conflicts(
            "default",
            "MachineSet",
            "mst-1",
            "owner",
            Box::new(move |meta, _spec| {
                meta.labels.extend(spec.clone());
                Ok(())
            }),
        )
        .await
        .unwrap();

    store
        .create("default", "ClusterMachine", "mch-1", "owner", json!({}))
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    cancel.cancel();
    handle.await.unwrap().unwrap();

    assert!(controller.0.lock().contains(&"mst-1".to_string()));
}
