// SPDX-License-Identifier: MIT

use super::*;
use omni_ctrl_core::resources::ConfigPatchSpec;

fn patch(id: &str, scope: omni_ctrl_core::resources::ConfigPatchScope) -> ConfigPatch {
    ConfigPatch {
        id: id.into(),
        scope,
        spec: ConfigPatchSpec { data: String::new() },
    }
}

#[test]
fn concatenates_levels_cluster_first_machine_last() {
    let cluster: ClusterId = "clu-1".into();
    let machine_set: MachineSetId = "mst-1".into();
    let cluster_machine: MachineId = "mch-1".into();
    let machine: MachineId = "mch-1".into();

    let patches = vec![
        patch(
            "cfp-m",
            omni_ctrl_core::resources::ConfigPatchScope {
                machine: Some(machine.clone()),
                ..Default::default()
            },
        ),
        patch(
            "cfp-c",
            omni_ctrl_core::resources::ConfigPatchScope {
                cluster: Some(cluster.clone()),
                ..Default::default()
            },
        ),
        patch(
            "cfp-cm",
            omni_ctrl_core::resources::ConfigPatchScope {
                cluster_machine: Some(cluster_machine.clone()),
                ..Default::default()
            },
        ),
        patch(
            "cfp-ms",
            omni_ctrl_core::resources::ConfigPatchScope {
                machine_set: Some(machine_set.clone()),
                ..Default::default()
            },
        ),
    ];

    let target = PatchTarget {
        cluster: &cluster,
        machine_set: &machine_set,
        cluster_machine: &cluster_machine,
        machine: &machine,
    };
    let ordered = compose_patches(&patches, &target);
    let ordered: Vec<&str> = ordered.iter().map(|id| id.as_str()).collect();
    assert_eq!(ordered, vec!["cfp-c", "cfp-ms", "cfp-cm", "cfp-m"]);
}

#[test]
fn ties_within_a_level_break_by_ascending_id() {
    let cluster: ClusterId = "clu-1".into();
    let machine_set: MachineSetId = "mst-1".into();
    let cluster_machine: MachineId = "mch-1".into();
    let machine: MachineId = "mch-1".into();

    let patches = vec![
        patch(
            "cfp-b",
            omni_ctrl_core::resources::ConfigPatchScope {
                cluster: Some(cluster.clone()),
                ..Default::default()
            },
        ),
        patch(
            "cfp-a",
            omni_ctrl_core::resources::ConfigPatchScope {
                cluster: Some(cluster.clone()),
                ..Default::default()
            },
        ),
    ];
    let target = PatchTarget {
        cluster: &cluster,
        machine_set: &machine_set,
        cluster_machine: &cluster_machine,
        machine: &machine,
    };
    let composed = compose_patches(&patches, &target);
    let ordered: Vec<&str> = composed.iter().map(|id| id.as_str()).collect();
    assert_eq!(ordered, vec!["cfp-a", "cfp-b"]);
}

#[test]
fn patches_scoped_to_a_different_cluster_are_excluded() {
    let cluster: ClusterId = "clu-1".into();
    let other: ClusterId = "clu-2".into();
    let machine_set: MachineSetId = "mst-1".into();
    let cluster_machine: MachineId = "mch-1".into();
    let machine: MachineId = "mch-1".into();

    let patches = vec![patch(
        "cfp-other",
        omni_ctrl_core::resources::ConfigPatchScope {
            cluster: Some(other),
            ..Default::default()
        },
    )];
    let target = PatchTarget {
        cluster: &cluster,
        machine_set: &machine_set,
        cluster_machine: &cluster_machine,
        machine: &machine,
    };
    assert!(compose_patches(&patches, &target).is_empty());
}
