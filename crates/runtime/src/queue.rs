// SPDX-License-Identifier: MIT

//! Per-controller coalescing work queue for Q-controllers (spec.md 4.1,
//! 5): duplicate primary ids collapse into a single pending re-run while
//! the item is queued or already running.

use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;

struct Inner {
    queued: VecDeque<String>,
    queued_set: HashSet<String>,
    running: HashSet<String>,
    /// Ids that arrived while their id was running; re-enqueued once the
    /// in-flight run finishes.
    rerun_after_running: HashSet<String>,
}

/// A coalescing FIFO of primary ids, shared by a Q-controller's worker
/// pool.
pub struct CoalescingQueue {
    inner: Mutex<Inner>,
    notify: Notify,
}

impl Default for CoalescingQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CoalescingQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                queued: VecDeque::new(),
                queued_set: HashSet::new(),
                running: HashSet::new(),
                rerun_after_running: HashSet::new(),
            }),
            notify: Notify::new(),
        }
    }

    /// Enqueue `id`. If already queued, this is a no-op (coalesced). If
    /// currently running, marks it for re-run once the current pass
    /// finishes instead of running concurrently with itself.
    pub fn push(self: &Arc<Self>, id: impl Into<String>) {
        let id = id.into();
        let mut inner = self.inner.lock();
        if inner.running.contains(&id) {
            inner.rerun_after_running.insert(id);
        } else if inner.queued_set.insert(id.clone()) {
            inner.queued.push_back(id);
        }
        drop(inner);
        self.notify.notify_one();
    }

    /// Dequeue the next id to run, marking it as running. Waits for work
    /// if the queue is empty.
    pub async fn pop(self: &Arc<Self>) -> String {
        loop {
            {
                let mut inner = self.inner.lock();
                if let Some(id) = inner.queued.pop_front() {
                    inner.queued_set.remove(&id);
                    inner.running.insert(id.clone());
                    return id;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Mark `id` as finished. If it was pushed again while running,
    /// re-enqueues it now.
    pub fn finish(self: &Arc<Self>, id: &str) {
        let mut inner = self.inner.lock();
        inner.running.remove(id);
        if inner.rerun_after_running.remove(id) && inner.queued_set.insert(id.to_string()) {
            inner.queued.push_back(id.to_string());
            drop(inner);
            self.notify.notify_one();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
