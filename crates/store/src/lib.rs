// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! omni-ctrl-store: the typed resource store client controllers consume
//! (spec.md 6, component C1). The storage engine and wire protocol are
//! non-goals (spec.md 1); this crate defines the trait boundary and ships
//! an in-memory implementation that is sufficient to drive the whole
//! reconciliation core in tests and the demo binary.

mod error;
mod memory;

pub use error::StoreError;
pub use memory::{shared, InMemoryStore};

use async_trait::async_trait;
use omni_ctrl_core::{Clock, LabelQuery, Meta};
use serde_json::Value;

/// A `(Meta, spec)` pair as read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResource {
    pub meta: Meta,
    pub spec: Value,
}

/// What changed, delivered to `watch_kind` subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Created(StoredResource),
    Updated(StoredResource),
    TearingDown(StoredResource),
    Destroyed { namespace: String, kind: String, id: String },
}

/// The resource store API every controller consumes (spec.md 6).
///
/// Implementations must provide per-id linearizability: writes to the
/// same `(namespace, kind, id)` are serialized and watchers observe every
/// version in order (spec.md 5).
#[async_trait]
pub trait Store: Send + Sync {
    async fn create(
        &self,
        namespace: &str,
        kind: &str,
        id: &str,
        owner: &str,
        spec: Value,
    ) -> Result<StoredResource, StoreError>;

    async fn get(&self, namespace: &str, kind: &str, id: &str) -> Result<StoredResource, StoreError>;

    async fn list(
        &self,
        namespace: &str,
        kind: &str,
        query: &LabelQuery,
    ) -> Result<Vec<StoredResource>, StoreError>;

    /// Read-modify-write under per-id serialization. `mutator` receives
    /// the current `(Meta, spec)` and returns the new spec; the store
    /// bumps `version`/`updated_at` and rejects the write with
    /// `StoreError::OwnerConflict` if `owner` doesn't match an existing
    /// non-empty owner.
    async fn update_with_conflicts(
        &self,
        namespace: &str,
        kind: &str,
        id: &str,
        owner: &str,
        mutator: Box<dyn for<'a> FnOnce(&'a mut Meta, &'a mut Value) -> Result<(), StoreError> + Send + 'static>,
    ) -> Result<StoredResource, StoreError>;

    /// Begin teardown: flips phase to `tearing_down` and notifies
    /// watchers. Idempotent — tearing down an already-tearing-down or
    /// missing resource succeeds.
    async fn teardown(&self, namespace: &str, kind: &str, id: &str, owner: &str) -> Result<(), StoreError>;

    /// Complete destruction. Requires the resource to be tearing down
    /// with no outstanding finalizers (I6); missing resources are treated
    /// as already destroyed (spec.md 7.3).
    async fn destroy(&self, namespace: &str, kind: &str, id: &str, owner: &str) -> Result<(), StoreError>;

    async fn add_finalizer(&self, namespace: &str, kind: &str, id: &str, name: &str) -> Result<(), StoreError>;

    async fn remove_finalizer(&self, namespace: &str, kind: &str, id: &str, name: &str) -> Result<(), StoreError>;

    fn watch_kind(&self, namespace: &str, kind: &str) -> tokio::sync::broadcast::Receiver<WatchEvent>;
}

/// Shared clock accessor so store implementations can timestamp resources
/// without each caller threading a clock through every call.
pub trait Clocked {
    fn clock(&self) -> &dyn Clock;
}
