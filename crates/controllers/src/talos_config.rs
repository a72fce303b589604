// SPDX-License-Identifier: MIT

//! TalosConfig controller (C9, spec.md 4.8): mints a fresh per-cluster
//! client certificate once the current one has aged past half its
//! lifetime, and keeps `TalosConfig.ca` carrying the right set of
//! accepted CAs for the cluster's current CA rotation phase.
//!
//! Driven the same way `config_patch_cleanup` and `k8s_node_auditor`
//! drive their periodic work: one controller instance re-lists every
//! Cluster each pass and requeues itself, rather than fanning out into a
//! Q-controller per cluster — there's no per-cluster backpressure here
//! worth the extra machinery.

use crate::kinds;
use crate::store_ext::{encode, get_optional, list_typed, map_store_error, NAMESPACE};
use async_trait::async_trait;
use omni_ctrl_adapters::CertMinter;
use omni_ctrl_core::resources::{CaRotationPhase, Cluster, ClusterCaState, TalosConfig};
use omni_ctrl_core::{Clock, LabelQuery, Reconciled, ReconcileError, ReconcileOutcome};
use omni_ctrl_runtime::Controller;
use omni_ctrl_store::{Store, StoreError};
use std::sync::Arc;
use std::time::Duration;

pub const OWNER: &str = "talos_config_controller";
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(30);
/// Mint a replacement certificate once the current one has consumed this
/// fraction of its lifetime (spec.md 4.8: "aged past 50% of its
/// lifetime").
const REFRESH_FRACTION: f64 = 0.5;

pub struct TalosConfigController {
    pub store: Arc<dyn Store>,
    pub clock: Arc<dyn Clock>,
    pub cert_minter: Arc<dyn CertMinter>,
    pub check_interval: Duration,
}

impl TalosConfigController {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, cert_minter: Arc<dyn CertMinter>) -> Self {
        Self {
            store,
            clock,
            cert_minter,
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }
}

/// The signing CA and the ordered set of accepted CAs for a rotation
/// phase (spec.md 4.8 table). `state.current_ca` is the CA active before
/// rotation started; `state.new_ca` is the CA being rotated in.
fn signing_and_accepted(state: &ClusterCaState) -> (String, Vec<String>) {
    let new_ca = state.new_ca.clone().unwrap_or_default();
    match state.phase {
        CaRotationPhase::Ok => (state.current_ca.clone(), vec![state.current_ca.clone()]),
        CaRotationPhase::PreRotate => (state.current_ca.clone(), vec![state.current_ca.clone(), new_ca]),
        CaRotationPhase::Rotate => (new_ca.clone(), vec![state.current_ca.clone(), new_ca]),
        CaRotationPhase::PostRotate => (new_ca.clone(), vec![new_ca, state.current_ca.clone()]),
    }
}

#[async_trait]
impl Controller for TalosConfigController {
    fn name(&self) -> &'static str {
        OWNER
    }

    async fn reconcile(&self) -> Reconciled<ReconcileError> {
        let clusters = list_typed::<Cluster>(self.store.as_ref(), NAMESPACE, kinds::CLUSTER, &LabelQuery::new()).await?;
        let now = self.clock.epoch_ms();

        for (_, cluster) in clusters {
            let cluster_id = cluster.id.as_str();
            let Some((_, ca_state)) = get_optional::<ClusterCaState>(self.store.as_ref(), NAMESPACE, kinds::CLUSTER_CA_STATE, cluster_id).await?
            else {
                continue; // no secrets/CA material yet; nothing to mint against
            };

            let (signing_ca, accepted) = signing_and_accepted(&ca_state);
            let existing = get_optional::<TalosConfig>(self.store.as_ref(), NAMESPACE, kinds::TALOS_CONFIG, cluster_id).await?;

            let needs_mint = match &existing {
                None => true,
                Some((_, config)) => {
                    config.signing_ca != signing_ca || {
                        let age = now.saturating_sub(config.cert_issued_at_ms) as f64;
                        age >= config.cert_lifetime_ms as f64 * REFRESH_FRACTION
                    }
                }
            };

            if !needs_mint {
                if existing.map(|(_, c)| c.ca != accepted).unwrap_or(false) {
                    // CA acceptance list changed (rotation phase moved) without
                    // requiring a remint yet: update in place.
                    self.write_ca_list(cluster_id, &accepted).await?;
                }
                continue;
            }

            let minted = self
                .cert_minter
                .mint_client_cert(cluster_id, &signing_ca, now)
                .await
                .map_err(|e| ReconcileError::Transient(e.to_string()))?;

            let config = TalosConfig {
                cluster: cluster.id.clone(),
                ca: accepted,
                signing_ca,
                cert_issued_at_ms: minted.issued_at_ms,
                cert_lifetime_ms: minted.lifetime_ms,
            };
            self.upsert(cluster_id, config).await?;
        }

        Ok(ReconcileOutcome::Requeue(self.check_interval))
    }
}

impl TalosConfigController {
    async fn upsert(&self, cluster_id: &str, config: TalosConfig) -> Result<(), ReconcileError> {
        match self.store.get(NAMESPACE, kinds::TALOS_CONFIG, cluster_id).await {
            Ok(_) => {
                self.store
                    .update_with_conflicts(
                        NAMESPACE,
                        kinds::TALOS_CONFIG,
                        cluster_id,
                        OWNER,
                        Box::new(move |_meta, spec| {
                            *spec = encode(&config);
                            Ok(())
                        }),
                    )
                    .await
                    .map_err(map_store_error)?;
            }
            Err(StoreError::NotFound { .. }) => {
                self.store
                    .create(NAMESPACE, kinds::TALOS_CONFIG, cluster_id, OWNER, encode(&config))
                    .await
                    .map_err(map_store_error)?;
            }
            Err(err) => return Err(map_store_error(err)),
        }
        Ok(())
    }

    async fn write_ca_list(&self, cluster_id: &str, accepted: &[String]) -> Result<(), ReconcileError> {
        let accepted = accepted.to_vec();
        self.store
            .update_with_conflicts(
                NAMESPACE,
                kinds::TALOS_CONFIG,
                cluster_id,
                OWNER,
                Box::new(move |_meta, spec| {
                    if let Some(obj) = spec.as_object_mut() {
                        obj.insert("ca".to_string(), serde_json::json!(accepted));
                    }
                    Ok(())
                }),
            )
            .await
            .map_err(map_store_error)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "talos_config_tests.rs"]
mod tests;
