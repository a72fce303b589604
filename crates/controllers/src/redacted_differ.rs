// SPDX-License-Identifier: MIT

//! Redacted-config differ (C11, spec.md 4.10): mirrors each machine's raw
//! `ClusterMachineConfig` into a `RedactedClusterMachineConfig` with
//! secret fields replaced, and records a `MachineConfigDiff` on every
//! change (never on initial creation). A sibling periodic controller
//! prunes the diff history by age and by count.
//!
//! The two controllers write under the same `OWNER`: they're one
//! component (C11) running on two schedules, not two independent
//! authors of the same resources.

use crate::kinds;
use crate::store_ext::{encode, get_optional, list_typed, map_store_error, NAMESPACE};
use async_trait::async_trait;
use omni_ctrl_core::clock::epoch_ms_to_rfc3339_millis;
use omni_ctrl_core::ids::MachineId;
use omni_ctrl_core::resources::{ClusterMachineConfig, MachineConfigDiff, RedactedClusterMachineConfig};
use omni_ctrl_core::{Clock, LabelQuery, Meta, Phase, Reconciled, ReconcileError, ReconcileOutcome};
use omni_ctrl_runtime::{teardown_and_destroy, Controller, QController};
use omni_ctrl_store::Store;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const OWNER: &str = "redacted_config_differ";

pub const DEFAULT_PRUNE_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_DIFF_MAX_AGE: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_DIFF_MAX_COUNT: usize = 2;

/// Key suffixes (case-insensitive, matched against the part of the YAML
/// key before `:`) that mark a scalar value as secret material. Deliberately
/// narrow: anything not matched here — including certificate fields such
/// as `crt` — passes through unredacted.
const SECRET_KEY_SUFFIXES: &[&str] = &["token", "secret", "key"];

/// Replaces scalar values under secret-looking keys with `'******'`,
/// line by line, leaving structure, comments and certificate fields
/// untouched (spec.md 4.10, 6 "bit-exact" persisted shape).
pub fn redact_yaml(yaml: &str) -> String {
    yaml.lines()
        .map(redact_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn redact_line(line: &str) -> String {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') || trimmed.starts_with('-') || !trimmed.contains(':') {
        return line.to_string();
    }
    let indent = &line[..line.len() - trimmed.len()];
    let Some((key, value)) = trimmed.split_once(':') else {
        return line.to_string();
    };
    let value = value.trim();
    if value.is_empty() {
        return line.to_string(); // nested mapping follows; nothing to redact here
    }
    let key = key.trim();
    if SECRET_KEY_SUFFIXES.iter().any(|suffix| key.to_lowercase().ends_with(suffix)) {
        format!("{indent}{key}: '******'")
    } else {
        line.to_string()
    }
}

fn unified_diff(old: &str, new: &str) -> String {
    similar::TextDiff::from_lines(old, new).unified_diff().to_string()
}

pub struct RedactedConfigController {
    pub store: Arc<dyn Store>,
    pub clock: Arc<dyn Clock>,
}

impl RedactedConfigController {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    async fn retire(&self, machine_id: &str) -> Reconciled<ReconcileError> {
        let outcome = teardown_and_destroy(
            self.store.as_ref(),
            NAMESPACE,
            kinds::REDACTED_CLUSTER_MACHINE_CONFIG,
            machine_id,
            OWNER,
        )
        .await?;
        destroy_diffs_for_machine(self.store.as_ref(), &MachineId::from(machine_id)).await?;
        Ok(outcome)
    }
}

#[async_trait]
impl QController for RedactedConfigController {
    fn name(&self) -> &'static str {
        OWNER
    }

    async fn reconcile(&self, id: &str) -> Reconciled<ReconcileError> {
        let raw = get_optional::<ClusterMachineConfig>(self.store.as_ref(), NAMESPACE, kinds::CLUSTER_MACHINE_CONFIG, id).await?;

        let Some((meta, raw)) = raw else {
            return self.retire(id).await;
        };
        if meta.phase == Phase::TearingDown {
            return self.retire(id).await;
        }

        let redacted_yaml = redact_yaml(&raw.yaml);
        let existing = get_optional::<RedactedClusterMachineConfig>(self.store.as_ref(), NAMESPACE, kinds::REDACTED_CLUSTER_MACHINE_CONFIG, id).await?;

        match existing {
            None => {
                self.store
                    .create(
                        NAMESPACE,
                        kinds::REDACTED_CLUSTER_MACHINE_CONFIG,
                        id,
                        OWNER,
                        encode(&RedactedClusterMachineConfig { machine: raw.machine.clone(), yaml: redacted_yaml }),
                    )
                    .await
                    .map_err(map_store_error)?;
                Ok(ReconcileOutcome::Ok)
            }
            Some((_, previous)) if previous.yaml == redacted_yaml => Ok(ReconcileOutcome::Skip),
            Some((_, previous)) => {
                let redacted_yaml_for_update = redacted_yaml.clone();
                self.store
                    .update_with_conflicts(
                        NAMESPACE,
                        kinds::REDACTED_CLUSTER_MACHINE_CONFIG,
                        id,
                        OWNER,
                        Box::new(move |_meta, spec| {
                            if let Some(obj) = spec.as_object_mut() {
                                obj.insert("yaml".to_string(), serde_json::json!(redacted_yaml_for_update));
                            }
                            Ok(())
                        }),
                    )
                    .await
                    .map_err(map_store_error)?;

                let now = self.clock.epoch_ms();
                let diff_id = format!("{}-{}", raw.machine.as_str(), epoch_ms_to_rfc3339_millis(now));
                self.store
                    .create(
                        NAMESPACE,
                        kinds::MACHINE_CONFIG_DIFF,
                        &diff_id,
                        OWNER,
                        encode(&MachineConfigDiff {
                            id: diff_id.clone(),
                            machine: raw.machine.clone(),
                            created_at_ms: now,
                            unified_diff: unified_diff(&previous.yaml, &redacted_yaml),
                        }),
                    )
                    .await
                    .map_err(map_store_error)?;
                Ok(ReconcileOutcome::Ok)
            }
        }
    }
}

async fn destroy_diffs_for_machine(store: &dyn Store, machine: &MachineId) -> Result<(), ReconcileError> {
    let diffs = list_typed::<MachineConfigDiff>(store, NAMESPACE, kinds::MACHINE_CONFIG_DIFF, &LabelQuery::new()).await?;
    for (_, diff) in diffs.into_iter().filter(|(_, d)| &d.machine == machine) {
        teardown_and_destroy(store, NAMESPACE, kinds::MACHINE_CONFIG_DIFF, &diff.id, OWNER).await?;
    }
    Ok(())
}

pub struct RedactedConfigPruneController {
    pub store: Arc<dyn Store>,
    pub clock: Arc<dyn Clock>,
    pub check_interval: Duration,
    pub diff_max_age: Duration,
    pub diff_max_count: usize,
}

impl RedactedConfigPruneController {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            check_interval: DEFAULT_PRUNE_INTERVAL,
            diff_max_age: DEFAULT_DIFF_MAX_AGE,
            diff_max_count: DEFAULT_DIFF_MAX_COUNT,
        }
    }
}

#[async_trait]
impl Controller for RedactedConfigPruneController {
    fn name(&self) -> &'static str {
        "redacted_config_prune"
    }

    async fn reconcile(&self) -> Reconciled<ReconcileError> {
        let diffs = list_typed::<MachineConfigDiff>(self.store.as_ref(), NAMESPACE, kinds::MACHINE_CONFIG_DIFF, &LabelQuery::new()).await?;
        let now = self.clock.epoch_ms();

        let mut by_machine: HashMap<MachineId, Vec<(Meta, MachineConfigDiff)>> = HashMap::new();
        for (meta, diff) in diffs {
            by_machine.entry(diff.machine.clone()).or_default().push((meta, diff));
        }

        for (_, mut group) in by_machine {
            group.sort_by(|a, b| b.1.created_at_ms.cmp(&a.1.created_at_ms));

            for (index, (_, diff)) in group.iter().enumerate() {
                let age_ms = now.saturating_sub(diff.created_at_ms);
                let too_old = age_ms as u128 > self.diff_max_age.as_millis();
                let over_count = index >= self.diff_max_count;
                if too_old || over_count {
                    teardown_and_destroy(self.store.as_ref(), NAMESPACE, kinds::MACHINE_CONFIG_DIFF, &diff.id, OWNER).await?;
                }
            }
        }

        Ok(ReconcileOutcome::Requeue(self.check_interval))
    }
}

#[cfg(test)]
#[path = "redacted_differ_tests.rs"]
mod tests;
