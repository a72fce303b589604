// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Errors from the external collaborators (spec.md 1, 6): the Talos gRPC
/// client, the Kubernetes client, the discovery service and the image
/// factory are all out of scope to implement — this crate fixes only the
/// interfaces the core consumes them through.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    #[error("{0}")]
    Unavailable(String),
    #[error("not found: {0}")]
    NotFound(String),
}
