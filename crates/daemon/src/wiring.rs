// SPDX-License-Identifier: MIT

//! Constructs the store, the adapter fakes, and the
//! [`ControllerRuntime`] with all eleven controllers registered
//! (spec.md 4.12): one `InMemoryStore`, one `ControllerRuntime`, one
//! `PeersPool`, and a feeder/driver pair per controller. None of the
//! external collaborators (Talos, Kubernetes, discovery, the
//! certificate mint, the WireGuard device) have a real implementation in
//! this workspace, so this binary runs entirely against the
//! `test-support` fakes — sufficient to exercise the whole
//! reconciliation core end to end, not to operate a real cluster.

use crate::config::RuntimeConfig;
use omni_ctrl_adapters::cert::fake::FakeCertMinter;
use omni_ctrl_adapters::discovery::fake::FakeDiscoveryClient;
use omni_ctrl_adapters::kubernetes::fake::FakeKubernetesClient;
use omni_ctrl_adapters::talos::fake::FakeTalosMachineClient;
use omni_ctrl_adapters::wireguard::fake::FakeWireGuardHandler;
use omni_ctrl_controllers::{
    kinds, CertRefreshTickController, ConfigPatchCleanupController, JoinTokenStatusController,
    KubernetesNodeAuditorController, LinkStatusController, MachineSetController, PeersPool, PendingMachineStatusController,
    RedactedConfigController, RedactedConfigPruneController, TalosConfigController, TalosUpgradeController,
};
use omni_ctrl_core::labels::{LABEL_CLUSTER, LABEL_MACHINE_SET};
use omni_ctrl_core::Clock;
use omni_ctrl_runtime::{ControllerRuntime, ExtraInput, InputMapper};
use omni_ctrl_store::{Store, WatchEvent};
use std::sync::Arc;

const NAMESPACE: &str = "default";

/// Builds an [`InputMapper`] that wakes the primary resource named by
/// `label_key` on a watched resource's labels, and does nothing for
/// `Destroyed` events (the store drops labels along with everything else
/// once a resource is gone; a live primary is woken by its own watch
/// instead).
fn wake_by_label(label_key: &'static str) -> InputMapper {
    Arc::new(move |event: &WatchEvent| match event {
        WatchEvent::Created(resource) | WatchEvent::Updated(resource) | WatchEvent::TearingDown(resource) => {
            resource.meta.labels.get(label_key).cloned().into_iter().collect()
        }
        WatchEvent::Destroyed { .. } => Vec::new(),
    })
}

/// Builds an [`InputMapper`] for an extra input keyed by the same id as
/// its primary (e.g. `KubernetesStatus`, stored under the cluster id it
/// observes — same as `ClusterKubernetesNodes`).
fn wake_by_same_id() -> InputMapper {
    Arc::new(|event: &WatchEvent| match event {
        WatchEvent::Created(resource) | WatchEvent::Updated(resource) | WatchEvent::TearingDown(resource) => {
            vec![resource.meta.id.clone()]
        }
        WatchEvent::Destroyed { .. } => Vec::new(),
    })
}

/// Everything the daemon constructs besides the runtime itself, kept
/// alive for the process lifetime (the runtime only borrows references
/// through the `Arc`s it was handed).
pub struct Daemon {
    pub store: Arc<dyn Store>,
    pub peers_pool: Arc<PeersPool>,
    pub runtime: ControllerRuntime,
}

pub fn build(config: &RuntimeConfig, store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Daemon {
    let talos = Arc::new(FakeTalosMachineClient::new());
    let kubernetes = Arc::new(FakeKubernetesClient::new());
    let discovery = Arc::new(FakeDiscoveryClient::new());
    let cert_minter = Arc::new(FakeCertMinter::new(config.cert_lifetime_ms));
    let wireguard = Arc::new(FakeWireGuardHandler::new());
    let peers_pool = Arc::new(PeersPool::new(wireguard));

    let mut runtime = ControllerRuntime::new(store.clone());

    runtime.spawn_qcontroller(
        Arc::new(MachineSetController {
            store: store.clone(),
            clock: clock.clone(),
            talos: talos.clone(),
            kubernetes: kubernetes.clone(),
            discovery,
        }),
        config.machine_set_concurrency,
        NAMESPACE,
        kinds::MACHINE_SET,
        vec![
            ExtraInput {
                namespace: NAMESPACE.to_string(),
                kind: kinds::MACHINE_SET_NODE.to_string(),
                mapper: wake_by_label(LABEL_MACHINE_SET),
            },
            ExtraInput {
                namespace: NAMESPACE.to_string(),
                kind: kinds::CLUSTER_MACHINE.to_string(),
                mapper: wake_by_label(LABEL_MACHINE_SET),
            },
        ],
    );

    runtime.spawn_qcontroller(
        Arc::new(TalosUpgradeController { store: store.clone() }),
        config.talos_upgrade_concurrency,
        NAMESPACE,
        kinds::CLUSTER,
        vec![ExtraInput {
            namespace: NAMESPACE.to_string(),
            kind: kinds::CLUSTER_MACHINE.to_string(),
            mapper: wake_by_label(LABEL_CLUSTER),
        }],
    );

    let mut k8s_node_auditor = KubernetesNodeAuditorController::new(store.clone(), clock.clone(), kubernetes);
    k8s_node_auditor.delete_older_than = config.delete_older_than();
    runtime.spawn_qcontroller(
        Arc::new(k8s_node_auditor),
        omni_ctrl_runtime::DEFAULT_CONCURRENCY,
        NAMESPACE,
        kinds::CLUSTER_KUBERNETES_NODES,
        vec![ExtraInput {
            namespace: NAMESPACE.to_string(),
            kind: kinds::KUBERNETES_STATUS.to_string(),
            mapper: wake_by_same_id(),
        }],
    );

    runtime.spawn_periodic(Arc::new({
        let mut controller = ConfigPatchCleanupController::new(store.clone(), clock.clone());
        controller.check_interval = config.config_patch_cleanup_check_interval();
        controller
    }));

    runtime.spawn_periodic(Arc::new(CertRefreshTickController::new(
        store.clone(),
        clock.clone(),
        config.cert_refresh_tick_period(),
    )));

    runtime.spawn_periodic(Arc::new({
        let mut controller = TalosConfigController::new(store.clone(), clock.clone(), cert_minter);
        controller.check_interval = config.talos_config_check_interval();
        controller
    }));

    runtime.spawn_periodic(Arc::new({
        let mut controller = JoinTokenStatusController::new(store.clone(), clock.clone());
        controller.check_interval = config.join_token_status_check_interval();
        controller
    }));

    runtime.spawn_qcontroller(
        Arc::new(LinkStatusController { store: store.clone(), pool: peers_pool.clone() }),
        config.peer_pool_concurrency,
        NAMESPACE,
        kinds::LINK,
        Vec::new(),
    );
    runtime.spawn_qcontroller(
        Arc::new(PendingMachineStatusController { store: store.clone(), pool: peers_pool.clone() }),
        config.peer_pool_concurrency,
        NAMESPACE,
        kinds::PENDING_MACHINE,
        Vec::new(),
    );

    runtime.spawn_qcontroller(
        Arc::new(RedactedConfigController::new(store.clone(), clock.clone())),
        config.redacted_config_concurrency,
        NAMESPACE,
        kinds::CLUSTER_MACHINE_CONFIG,
        Vec::new(),
    );
    runtime.spawn_periodic(Arc::new(RedactedConfigPruneController {
        store: store.clone(),
        clock,
        check_interval: config.redacted_config_prune_interval(),
        diff_max_age: config.redacted_config_diff_max_age(),
        diff_max_count: config.redacted_config_diff_max_count,
    }));

    Daemon { store, peers_pool, runtime }
}

#[cfg(test)]
#[path = "wiring_tests.rs"]
mod tests;
