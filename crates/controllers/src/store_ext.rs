// SPDX-License-Identifier: MIT

//! Thin typed-decode helpers over the JSON-valued [`Store`]. Every
//! concrete controller reads and writes plain Rust resource structs;
//! this module is the only place that touches `serde_json::Value`
//! directly.

use omni_ctrl_core::{LabelQuery, Meta, ReconcileError};
use omni_ctrl_store::{Store, StoreError, StoredResource};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const NAMESPACE: &str = "default";

pub fn map_store_error(err: StoreError) -> ReconcileError {
    match err {
        StoreError::OwnerConflict { .. } => ReconcileError::PolicyRefusal(err.to_string()),
        other => ReconcileError::Transient(other.to_string()),
    }
}

pub fn decode<T: DeserializeOwned>(resource: &StoredResource) -> Result<T, ReconcileError> {
    serde_json::from_value(resource.spec.clone()).map_err(|e| ReconcileError::Transient(e.to_string()))
}

pub fn encode<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).expect("resource specs are always serializable")
}

/// Reads `(namespace, kind, id)`, decoding its spec as `T`. A missing
/// resource is treated as `Ok(None)` (spec.md 7.2: not-found on an
/// optional input is silently absent).
pub async fn get_optional<T: DeserializeOwned>(
    store: &dyn Store,
    namespace: &str,
    kind: &str,
    id: &str,
) -> Result<Option<(Meta, T)>, ReconcileError> {
    match store.get(namespace, kind, id).await {
        Ok(resource) => Ok(Some((resource.meta.clone(), decode(&resource)?))),
        Err(StoreError::NotFound { .. }) => Ok(None),
        Err(err) => Err(map_store_error(err)),
    }
}

pub async fn list_typed<T: DeserializeOwned>(
    store: &dyn Store,
    namespace: &str,
    kind: &str,
    query: &LabelQuery,
) -> Result<Vec<(Meta, T)>, ReconcileError> {
    let resources = store
        .list(namespace, kind, query)
        .await
        .map_err(map_store_error)?;
    resources
        .iter()
        .map(|resource| Ok((resource.meta.clone(), decode(resource)?)))
        .collect()
}
