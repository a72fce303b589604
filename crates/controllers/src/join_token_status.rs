// SPDX-License-Identifier: MIT

//! JoinTokenStatus aggregator (spec.md 2 row C9, 3 "Auth"): a requeue-
//! driven controller that keeps one `JoinTokenStatus` per cluster up to
//! date with how many of that cluster's `JoinToken`s are still usable.
//!
//! Same shape as `talos_config`: re-list and upsert every pass rather
//! than watch individual tokens, since the aggregate only needs to be
//! eventually consistent with wall-clock expiry, not event-driven.

use crate::kinds;
use crate::store_ext::{encode, list_typed, map_store_error, NAMESPACE};
use async_trait::async_trait;
use omni_ctrl_core::resources::{Cluster, JoinToken, JoinTokenStatus};
use omni_ctrl_core::{Clock, LabelQuery, Reconciled, ReconcileError, ReconcileOutcome};
use omni_ctrl_runtime::Controller;
use omni_ctrl_store::{Store, StoreError};
use std::sync::Arc;
use std::time::Duration;

pub const OWNER: &str = "join_token_status_controller";
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(30);

pub struct JoinTokenStatusController {
    pub store: Arc<dyn Store>,
    pub clock: Arc<dyn Clock>,
    pub check_interval: Duration,
}

impl JoinTokenStatusController {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }
}

fn is_expired(token: &JoinToken, now_ms: u64) -> bool {
    matches!(token.spec.expiration_ms, Some(expiration) if expiration <= now_ms)
}

#[async_trait]
impl Controller for JoinTokenStatusController {
    fn name(&self) -> &'static str {
        OWNER
    }

    async fn reconcile(&self) -> Reconciled<ReconcileError> {
        let clusters = list_typed::<Cluster>(self.store.as_ref(), NAMESPACE, kinds::CLUSTER, &LabelQuery::new()).await?;
        let tokens = list_typed::<JoinToken>(self.store.as_ref(), NAMESPACE, kinds::JOIN_TOKEN, &LabelQuery::new()).await?;
        let now = self.clock.epoch_ms();

        for (_, cluster) in &clusters {
            let mut status = JoinTokenStatus {
                cluster: cluster.id.clone(),
                active_tokens: 0,
                expired_tokens: 0,
            };
            for (_, token) in &tokens {
                if token.spec.cluster != cluster.id {
                    continue;
                }
                if is_expired(token, now) {
                    status.expired_tokens += 1;
                } else {
                    status.active_tokens += 1;
                }
            }
            self.upsert(cluster.id.as_str(), status).await?;
        }

        Ok(ReconcileOutcome::Requeue(self.check_interval))
    }
}

impl JoinTokenStatusController {
    async fn upsert(&self, cluster_id: &str, status: JoinTokenStatus) -> Result<(), ReconcileError> {
        match self.store.get(NAMESPACE, kinds::JOIN_TOKEN_STATUS, cluster_id).await {
            Ok(_) => {
                self.store
                    .update_with_conflicts(
                        NAMESPACE,
                        kinds::JOIN_TOKEN_STATUS,
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
                    .create(NAMESPACE, kinds::JOIN_TOKEN_STATUS, cluster_id, OWNER, encode(&status))
                    .await
                    .map_err(map_store_error)?;
            }
            Err(err) => return Err(map_store_error(err)),
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "join_token_status_tests.rs"]
mod tests;
