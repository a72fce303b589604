// SPDX-License-Identifier: MIT

//! Shared error taxonomy (spec.md 7).

use thiserror::Error;

/// Errors a controller's reconcile body can return. The runtime maps
/// these onto backoff/requeue behavior; see `omni-ctrl-runtime`.
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    /// Transient failure (network, temporary store conflict): retried by
    /// runtime backoff (spec.md 7.1).
    #[error("transient error: {0}")]
    Transient(String),

    /// Policy refusal: e.g. a control-plane scale-down that would lose
    /// quorum. Retried by backoff but never mutates state (spec.md 7.6).
    #[error("policy refusal: {0}")]
    PolicyRefusal(String),

    /// Failure to construct a required client at controller startup;
    /// propagates and terminates the runtime (spec.md 7.7).
    #[error("fatal setup error: {0}")]
    FatalSetup(String),
}

impl ReconcileError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ReconcileError::FatalSetup(_))
    }
}
