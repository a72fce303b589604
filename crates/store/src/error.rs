// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Errors the resource store surface (spec.md 6): distinguishes
/// `not_found`, `conflict` and `owner_conflict` so callers can apply the
/// taxonomy in spec.md 7.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{kind}/{id} not found in namespace {namespace}")]
    NotFound {
        namespace: String,
        kind: String,
        id: String,
    },

    #[error("{kind}/{id} already exists in namespace {namespace}")]
    AlreadyExists {
        namespace: String,
        kind: String,
        id: String,
    },

    #[error("version conflict updating {kind}/{id}: expected {expected}, found {found}")]
    Conflict {
        kind: String,
        id: String,
        expected: u64,
        found: u64,
    },

    #[error("owner conflict on {kind}/{id}: owned by {actual_owner:?}, write attempted by {attempted_owner:?}")]
    OwnerConflict {
        kind: String,
        id: String,
        actual_owner: String,
        attempted_owner: String,
    },

    #[error("{kind}/{id} is not ready to be destroyed (still tearing down or has finalizers)")]
    NotReady { kind: String, id: String },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
