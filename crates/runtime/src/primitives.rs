// SPDX-License-Identifier: MIT

//! Shared reconciliation primitives used across concrete controllers
//! (spec.md 4.2, component C3): input fingerprinting so a controller can
//! skip a no-op pass, and the teardown-then-destroy sequence every
//! owner-side controller uses to retire a resource once its finalizers
//! have cleared (I6).

use omni_ctrl_core::ReconcileOutcome;
use omni_ctrl_core::{Reconciled, ReconcileError};
use omni_ctrl_store::{Store, StoreError, StoredResource};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Annotation key a controller stores the last-applied
/// [`fingerprint_inputs`] result under, to detect a wakeup that carries
/// no actual change and return `ReconcileOutcome::Skip`.
pub const INPUT_FINGERPRINT_ANNOTATION: &str = "omni-ctrl.dev/input-fingerprint";

/// How long to wait before re-checking whether a torn-down resource's
/// finalizers have cleared.
const FINALIZER_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Hashes a set of `(input_type, id, version)` triples into a stable
/// fingerprint, independent of the order they're supplied in. Controllers
/// that read N input kinds use this to recognize "nothing I depend on
/// has actually changed" and return early.
pub fn fingerprint_inputs(inputs: &[(&str, &str, u64)]) -> String {
    let mut sorted: Vec<(&str, &str, u64)> = inputs.to_vec();
    sorted.sort_unstable();

    let mut hasher = Sha256::new();
    for (input_type, id, version) in sorted {
        hasher.update(input_type.as_bytes());
        hasher.update(b"\0");
        hasher.update(id.as_bytes());
        hasher.update(b"\0");
        hasher.update(version.to_le_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

fn map_store_error(err: StoreError) -> ReconcileError {
    match err {
        StoreError::OwnerConflict { .. } => ReconcileError::PolicyRefusal(err.to_string()),
        other => ReconcileError::Transient(other.to_string()),
    }
}

/// Begins teardown of `(namespace, kind, id)` and destroys it once its
/// finalizers have cleared (I6), requeuing with a short poll interval in
/// the meantime. Idempotent: safe to call on every reconcile of a
/// resource that is owned-and-dying.
pub async fn teardown_and_destroy(
    store: &dyn Store,
    namespace: &str,
    kind: &str,
    id: &str,
    owner: &str,
) -> Reconciled<ReconcileError> {
    store
        .teardown(namespace, kind, id, owner)
        .await
        .map_err(map_store_error)?;

    let resource: StoredResource = match store.get(namespace, kind, id).await {
        Ok(resource) => resource,
        Err(StoreError::NotFound { .. }) => return Ok(ReconcileOutcome::Ok),
        Err(err) => return Err(map_store_error(err)),
    };

    if !resource.meta.destroy_ready() {
        return Ok(ReconcileOutcome::Requeue(FINALIZER_POLL_INTERVAL));
    }

    match store.destroy(namespace, kind, id, owner).await {
        Ok(()) => Ok(ReconcileOutcome::Ok),
        Err(StoreError::NotFound { .. }) => Ok(ReconcileOutcome::Ok),
        Err(err) => Err(map_store_error(err)),
    }
}

#[cfg(test)]
#[path = "primitives_tests.rs"]
mod tests;
