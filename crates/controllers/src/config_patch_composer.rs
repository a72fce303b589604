// SPDX-License-Identifier: MIT

//! Config-patch composer (C5, spec.md 4.4): aggregates `ConfigPatch`es by
//! label hierarchy into the ordered patch list a ClusterMachine applies.
//!
//! Each patch is scoped to exactly one of the four levels — the single
//! populated field in its `ConfigPatchScope` — and levels are
//! concatenated cluster-first, machine-last. Within a level, ties are
//! broken by ascending patch id for determinism (spec.md 4.4).

use omni_ctrl_core::ids::{ClusterId, ConfigPatchId, MachineId, MachineSetId};
use omni_ctrl_core::resources::{ConfigPatch, ConfigPatchScope};

/// The four-level target a ClusterMachine's config is composed against.
pub struct PatchTarget<'a> {
    pub cluster: &'a ClusterId,
    pub machine_set: &'a MachineSetId,
    pub cluster_machine: &'a MachineId,
    pub machine: &'a MachineId,
}

/// The specificity level `scope` matches `target` at, or `None` if it
/// doesn't apply (wrong target, or not scoped to exactly one level).
/// Shared by C5's patch composition and C6's schematic selection — both
/// rely on the same four-level rule (spec.md 4.4, 4.5).
pub fn scope_level(scope: &ConfigPatchScope, target: &PatchTarget<'_>) -> Option<u8> {
    let populated = [
        scope.cluster.is_some(),
        scope.machine_set.is_some(),
        scope.cluster_machine.is_some(),
        scope.machine.is_some(),
    ]
    .iter()
    .filter(|p| **p)
    .count();
    if populated != 1 {
        return None;
    }
    if let Some(cluster) = &scope.cluster {
        return (cluster == target.cluster).then_some(0);
    }
    if let Some(machine_set) = &scope.machine_set {
        return (machine_set == target.machine_set).then_some(1);
    }
    if let Some(cluster_machine) = &scope.cluster_machine {
        return (cluster_machine == target.cluster_machine).then_some(2);
    }
    if let Some(machine) = &scope.machine {
        return (machine == target.machine).then_some(3);
    }
    None
}

fn level_matches(patch: &ConfigPatch, target: &PatchTarget<'_>) -> Option<u8> {
    scope_level(&patch.scope, target)
}

/// Picks the most-specific `item` whose scope matches `target`, breaking
/// ties between equally-specific items by ascending `id` (C6, spec.md 4.5:
/// "same four-level rule as C5, most-specific wins").
pub fn select_most_specific<'a, T>(
    items: &'a [T],
    id_of: impl Fn(&T) -> &str,
    scope_of: impl Fn(&T) -> &ConfigPatchScope,
    target: &PatchTarget<'_>,
) -> Option<&'a T> {
    items
        .iter()
        .filter_map(|item| scope_level(scope_of(item), target).map(|level| (level, item)))
        .max_by(|(level_a, a), (level_b, b)| level_a.cmp(level_b).then_with(|| id_of(b).cmp(id_of(a))))
        .map(|(_, item)| item)
}

/// Produces the ordered patch id list for `target` out of every
/// `ConfigPatch` in the store (already filtered to the relevant
/// namespace by the caller).
pub fn compose_patches(patches: &[ConfigPatch], target: &PatchTarget<'_>) -> Vec<ConfigPatchId> {
    let mut by_level: [Vec<&ConfigPatch>; 4] = Default::default();
    for patch in patches {
        if let Some(level) = level_matches(patch, target) {
            by_level[level as usize].push(patch);
        }
    }
    let mut result = Vec::new();
    for level in by_level.iter_mut() {
        level.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        result.extend(level.iter().map(|p| p.id.clone()));
    }
    result
}

#[cfg(test)]
#[path = "config_patch_composer_tests.rs"]
mod tests;
