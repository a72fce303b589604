// SPDX-License-Identifier: MIT

use super::*;
use std::collections::BTreeMap;

#[test]
fn query_matches_only_when_all_pairs_present() {
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_CLUSTER.to_string(), "c1".to_string());
    labels.insert(LABEL_MACHINE_SET.to_string(), "ms1".to_string());

    let q = LabelQuery::new().with(LABEL_CLUSTER, "c1");
    assert!(q.matches(&labels));

    let q2 = LabelQuery::new().with(LABEL_CLUSTER, "c1").with(LABEL_MACHINE_SET, "ms2");
    assert!(!q2.matches(&labels));
}

#[test]
fn empty_query_matches_everything() {
    let labels = BTreeMap::new();
    assert!(LabelQuery::new().matches(&labels));
}
