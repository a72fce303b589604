// SPDX-License-Identifier: MIT

//! Cert-refresh tick (C9, spec.md 4.8): a periodic controller with no
//! inputs that recreates a singleton `CertRefreshTick` resource on every
//! period, so the store genuinely emits a `Created` event each time (the
//! mechanism downstream watchers key off of). Downstream time-driven
//! controllers in this crate (`talos_config`, `join_token_status`) don't
//! subscribe to the tick directly — they're self-paced via
//! `ReconcileOutcome::Requeue`, the same idiom `config_patch_cleanup` and
//! `k8s_node_auditor` already use — but the tick resource is kept current
//! as the one store-visible heartbeat other (future, out-of-scope)
//! watchers can key off of.

use crate::kinds;
use crate::store_ext::{encode, map_store_error, NAMESPACE};
use async_trait::async_trait;
use omni_ctrl_core::resources::CertRefreshTick;
use omni_ctrl_core::{Clock, Reconciled, ReconcileError, ReconcileOutcome};
use omni_ctrl_runtime::Controller;
use omni_ctrl_store::Store;
use std::sync::Arc;
use std::time::Duration;

pub const OWNER: &str = "cert_refresh_tick";
const TICK_ID: &str = "tick";

/// Tick period used in this workspace's tests (spec.md 4.8: "100 ms in
/// tests").
pub const DEFAULT_PERIOD_TEST: Duration = Duration::from_millis(100);
/// Tick period outside tests; fast enough that the 50%-of-lifetime
/// refresh check in `talos_config` never lags a cert's actual expiry by
/// more than this.
pub const DEFAULT_PERIOD_PRODUCTION: Duration = Duration::from_secs(30);

pub struct CertRefreshTickController {
    pub store: Arc<dyn Store>,
    pub clock: Arc<dyn Clock>,
    pub period: Duration,
}

impl CertRefreshTickController {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, period: Duration) -> Self {
        Self { store, clock, period }
    }
}

#[async_trait]
impl Controller for CertRefreshTickController {
    fn name(&self) -> &'static str {
        OWNER
    }

    async fn reconcile(&self) -> Reconciled<ReconcileError> {
        if self.store.get(NAMESPACE, kinds::CERT_REFRESH_TICK, TICK_ID).await.is_ok() {
            self.store.teardown(NAMESPACE, kinds::CERT_REFRESH_TICK, TICK_ID, OWNER).await.map_err(map_store_error)?;
            self.store.destroy(NAMESPACE, kinds::CERT_REFRESH_TICK, TICK_ID, OWNER).await.map_err(map_store_error)?;
        }
        let tick = CertRefreshTick { tick_at_ms: self.clock.epoch_ms() };
        self.store
            .create(NAMESPACE, kinds::CERT_REFRESH_TICK, TICK_ID, OWNER, encode(&tick))
            .await
            .map_err(map_store_error)?;
        Ok(ReconcileOutcome::Requeue(self.period))
    }
}

#[cfg(test)]
#[path = "cert_refresh_tick_tests.rs"]
mod tests;
