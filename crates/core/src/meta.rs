// SPDX-License-Identifier: MIT

//! Resource metadata shared by every typed resource in the store.
//!
//! Identity is `(namespace, type, id)`. `version` increments on every
//! spec/label/annotation/finalizer mutation (I1/I10 in spec.md 3).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle phase of a resource (spec.md 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Running,
    TearingDown,
}

/// Resource metadata: everything about a resource except its typed spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub namespace: String,
    pub kind: String,
    pub id: String,
    pub version: u64,
    pub phase: Phase,
    /// Name of the controller that authored this resource's spec.
    /// Empty string means user-authored (spec.md 4.7 orphan rule).
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub finalizers: Vec<String>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl Meta {
    pub fn new(namespace: impl Into<String>, kind: impl Into<String>, id: impl Into<String>, now_ms: u64) -> Self {
        Self {
            namespace: namespace.into(),
            kind: kind.into(),
            id: id.into(),
            version: 1,
            phase: Phase::Running,
            owner: String::new(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            finalizers: Vec::new(),
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(|s| s.as_str())
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn has_finalizer(&self, name: &str) -> bool {
        self.finalizers.iter().any(|f| f == name)
    }

    pub fn add_finalizer(&mut self, name: &str) {
        if !self.has_finalizer(name) {
            self.finalizers.push(name.to_string());
        }
    }

    pub fn remove_finalizer(&mut self, name: &str) {
        self.finalizers.retain(|f| f != name);
    }

    /// I6: a tearing-down resource with finalizers still outstanding must
    /// not be destroyed.
    pub fn destroy_ready(&self) -> bool {
        self.phase == Phase::TearingDown && self.finalizers.is_empty()
    }

    pub fn touch(&mut self, now_ms: u64) {
        self.version += 1;
        self.updated_at_ms = now_ms;
    }

    /// Copy the named label keys from `source` onto `self`, leaving every
    /// other label untouched (C3 "copy labels" primitive).
    pub fn copy_labels_from(&mut self, source: &Meta, keys: &[&str]) {
        for key in keys {
            if let Some(v) = source.labels.get(*key) {
                self.labels.insert((*key).to_string(), v.clone());
            }
        }
    }

    /// Copy the named annotation keys from `source` onto `self`, leaving
    /// every other annotation untouched.
    pub fn copy_annotations_from(&mut self, source: &Meta, keys: &[&str]) {
        for key in keys {
            if let Some(v) = source.annotations.get(*key) {
                self.annotations.insert((*key).to_string(), v.clone());
            }
        }
    }
}

#[cfg(test)]
#[path = "meta_tests.rs"]
mod tests;
