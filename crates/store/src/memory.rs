// SPDX-License-Identifier: MIT

//! Reference in-memory `Store` implementation.

use crate::{Store, StoreError, StoredResource, WatchEvent};
use async_trait::async_trait;
use omni_ctrl_core::{Clock, LabelQuery, Meta, Phase, SystemClock};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

type ResourceMap = HashMap<(String, String, String), StoredResource>;
type Subscribers = HashMap<(String, String), broadcast::Sender<WatchEvent>>;

/// An in-memory `Store`, parameterized over an injectable clock so tests
/// can drive time-dependent sequencing deterministically.
pub struct InMemoryStore<C: Clock = SystemClock> {
    clock: C,
    resources: Mutex<ResourceMap>,
    subscribers: Mutex<Subscribers>,
}

impl<C: Clock> InMemoryStore<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            resources: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    fn key(namespace: &str, kind: &str, id: &str) -> (String, String, String) {
        (namespace.to_string(), kind.to_string(), id.to_string())
    }

    fn sender(&self, namespace: &str, kind: &str) -> broadcast::Sender<WatchEvent> {
        let mut subs = self.subscribers.lock();
        subs.entry((namespace.to_string(), kind.to_string()))
            .or_insert_with(|| broadcast::channel(1024).0)
            .clone()
    }

    fn publish(&self, namespace: &str, kind: &str, event: WatchEvent) {
        // Dropped receivers are not an error: watchers may not be
        // subscribed yet, or may have been torn down already.
        let _ = self.sender(namespace, kind).send(event);
    }
}

impl InMemoryStore<SystemClock> {
    pub fn new_system() -> Self {
        Self::new(SystemClock)
    }
}

#[async_trait]
impl<C: Clock> Store for InMemoryStore<C> {
    async fn create(
        &self,
        namespace: &str,
        kind: &str,
        id: &str,
        owner: &str,
        spec: Value,
    ) -> Result<StoredResource, StoreError> {
        let now = self.clock.epoch_ms();
        let key = Self::key(namespace, kind, id);
        {
            let mut resources = self.resources.lock();
            if resources.contains_key(&key) {
                return Err(StoreError::AlreadyExists {
                    namespace: namespace.to_string(),
                    kind: kind.to_string(),
                    id: id.to_string(),
                });
            }
            let meta = Meta::new(namespace, kind, id, now).with_owner(owner);
            resources.insert(key, StoredResource { meta, spec });
        }
        let resources = self.resources.lock();
        let stored = resources
            .get(&Self::key(namespace, kind, id))
            .expect("just inserted")
            .clone();
        drop(resources);
        self.publish(namespace, kind, WatchEvent::Created(stored.clone()));
        Ok(stored)
    }

    async fn get(&self, namespace: &str, kind: &str, id: &str) -> Result<StoredResource, StoreError> {
        let resources = self.resources.lock();
        resources
            .get(&Self::key(namespace, kind, id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                namespace: namespace.to_string(),
                kind: kind.to_string(),
                id: id.to_string(),
            })
    }

    async fn list(
        &self,
        namespace: &str,
        kind: &str,
        query: &LabelQuery,
    ) -> Result<Vec<StoredResource>, StoreError> {
        let resources = self.resources.lock();
        Ok(resources
            .iter()
            .filter(|((ns, k, _), _)| ns == namespace && k == kind)
            .map(|(_, v)| v)
            .filter(|r| query.matches(&r.meta.labels))
            .cloned()
            .collect())
    }

    async fn update_with_conflicts(
        &self,
        namespace: &str,
        kind: &str,
        id: &str,
        owner: &str,
        mutator: Box<dyn for<'a> FnOnce(&'a mut Meta, &'a mut Value) -> Result<(), StoreError> + Send + 'static>,
    ) -> Result<StoredResource, StoreError> {
        let now = self.clock.epoch_ms();
        let stored = {
            let mut resources = self.resources.lock();
            let key = Self::key(namespace, kind, id);
            let entry = resources.get_mut(&key).ok_or_else(|| StoreError::NotFound {
                namespace: namespace.to_string(),
                kind: kind.to_string(),
                id: id.to_string(),
            })?;
            if !entry.meta.owner.is_empty() && entry.meta.owner != owner {
                return Err(StoreError::OwnerConflict {
                    kind: kind.to_string(),
                    id: id.to_string(),
                    actual_owner: entry.meta.owner.clone(),
                    attempted_owner: owner.to_string(),
                });
            }
            mutator(&mut entry.meta, &mut entry.spec)?;
            if entry.meta.owner.is_empty() {
                entry.meta.owner = owner.to_string();
            }
            entry.meta.touch(now);
            entry.clone()
        };
        self.publish(namespace, kind, WatchEvent::Updated(stored.clone()));
        Ok(stored)
    }

    async fn teardown(&self, namespace: &str, kind: &str, id: &str, owner: &str) -> Result<(), StoreError> {
        let now = self.clock.epoch_ms();
        let stored = {
            let mut resources = self.resources.lock();
            let key = Self::key(namespace, kind, id);
            let Some(entry) = resources.get_mut(&key) else {
                // Idempotent: nothing to tear down.
                return Ok(());
            };
            if !entry.meta.owner.is_empty() && entry.meta.owner != owner {
                return Err(StoreError::OwnerConflict {
                    kind: kind.to_string(),
                    id: id.to_string(),
                    actual_owner: entry.meta.owner.clone(),
                    attempted_owner: owner.to_string(),
                });
            }
            if entry.meta.phase == Phase::TearingDown {
                return Ok(());
            }
            entry.meta.phase = Phase::TearingDown;
            entry.meta.touch(now);
            entry.clone()
        };
        self.publish(namespace, kind, WatchEvent::TearingDown(stored));
        Ok(())
    }

    async fn destroy(&self, namespace: &str, kind: &str, id: &str, owner: &str) -> Result<(), StoreError> {
        {
            let mut resources = self.resources.lock();
            let key = Self::key(namespace, kind, id);
            let Some(entry) = resources.get(&key) else {
                // Not-found on destroy: success (idempotence), spec.md 7.3.
                return Ok(());
            };
            if !entry.meta.owner.is_empty() && entry.meta.owner != owner {
                return Err(StoreError::OwnerConflict {
                    kind: kind.to_string(),
                    id: id.to_string(),
                    actual_owner: entry.meta.owner.clone(),
                    attempted_owner: owner.to_string(),
                });
            }
            if !entry.meta.destroy_ready() {
                return Err(StoreError::NotReady {
                    kind: kind.to_string(),
                    id: id.to_string(),
                });
            }
            resources.remove(&key);
        }
        self.publish(
            namespace,
            kind,
            WatchEvent::Destroyed {
                namespace: namespace.to_string(),
                kind: kind.to_string(),
                id: id.to_string(),
            },
        );
        Ok(())
    }

    async fn add_finalizer(&self, namespace: &str, kind: &str, id: &str, name: &str) -> Result<(), StoreError> {
        let now = self.clock.epoch_ms();
        let mut resources = self.resources.lock();
        let key = Self::key(namespace, kind, id);
        let entry = resources.get_mut(&key).ok_or_else(|| StoreError::NotFound {
            namespace: namespace.to_string(),
            kind: kind.to_string(),
            id: id.to_string(),
        })?;
        entry.meta.add_finalizer(name);
        entry.meta.touch(now);
        Ok(())
    }

    async fn remove_finalizer(&self, namespace: &str, kind: &str, id: &str, name: &str) -> Result<(), StoreError> {
        let now = self.clock.epoch_ms();
        let mut resources = self.resources.lock();
        let key = Self::key(namespace, kind, id);
        let Some(entry) = resources.get_mut(&key) else {
            // Releasing a finalizer on an already-destroyed resource is a no-op.
            return Ok(());
        };
        entry.meta.remove_finalizer(name);
        entry.meta.touch(now);
        Ok(())
    }

    fn watch_kind(&self, namespace: &str, kind: &str) -> broadcast::Receiver<WatchEvent> {
        self.sender(namespace, kind).subscribe()
    }
}

/// Convenience constructor returning an `Arc`-wrapped store, matching how
/// every caller in this workspace actually uses it.
pub fn shared<C: Clock>(clock: C) -> Arc<InMemoryStore<C>> {
    Arc::new(InMemoryStore::new(clock))
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
