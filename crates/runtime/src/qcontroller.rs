// SPDX-License-Identifier: MIT

//! Q-controller contract and worker pool driver (spec.md 4.1, 5).
//!
//! A Q-controller's primary ids are coalesced through a
//! [`CoalescingQueue`]; a configurable number of workers pop ids and
//! reconcile them concurrently, but never two workers on the same id.
//! Implementations are expected to branch on the primary resource's
//! [`omni_ctrl_core::Phase`] inside `reconcile` and call their own
//! `transform` path when running and their own `finalizer_removal` path
//! when tearing down — the driver itself does not need to know which
//! path ran, only the coalescing-by-id and backoff-on-error contract.

use crate::backoff::Backoff;
use crate::queue::CoalescingQueue;
use async_trait::async_trait;
use omni_ctrl_core::{Reconciled, ReconcileError, ReconcileOutcome};
use omni_ctrl_store::WatchEvent;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

#[async_trait]
pub trait QController: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Reconcile the primary resource identified by `id`. Never called
    /// concurrently for the same `id`.
    async fn reconcile(&self, id: &str) -> Reconciled<ReconcileError>;
}

/// Maps a watch event on an extra (non-primary) input kind to the
/// primary ids it should wake. Returning an empty vec means the event
/// doesn't affect any primary resource.
pub type InputMapper = Arc<dyn Fn(&WatchEvent) -> Vec<String> + Send + Sync>;

/// Runs `concurrency` workers pulling from `queue`, each invoking
/// `controller.reconcile` with per-id exponential backoff on error.
/// Returns the first fatal error encountered, cancelling all workers.
pub async fn run_qcontroller(
    controller: Arc<dyn QController>,
    queue: Arc<CoalescingQueue>,
    concurrency: usize,
    cancel: CancellationToken,
) -> Result<(), ReconcileError> {
    let concurrency = concurrency.max(1);
    let backoffs: Arc<Mutex<HashMap<String, Backoff>>> = Arc::new(Mutex::new(HashMap::new()));
    let mut workers = Vec::with_capacity(concurrency);

    for _ in 0..concurrency {
        let controller = controller.clone();
        let queue = queue.clone();
        let backoffs = backoffs.clone();
        let cancel = cancel.clone();
        workers.push(tokio::spawn(async move {
            loop {
                let id = tokio::select! {
                    _ = cancel.cancelled() => return Ok(()),
                    id = queue.pop() => id,
                };

                let outcome = controller.reconcile(&id).await;
                let requeue_delay = match &outcome {
                    Ok(ReconcileOutcome::Ok) | Ok(ReconcileOutcome::Skip) => {
                        backoffs.lock().remove(&id);
                        None
                    }
                    Ok(ReconcileOutcome::Requeue(delay)) => {
                        backoffs.lock().remove(&id);
                        Some(*delay)
                    }
                    Err(err) if err.is_fatal() => {
                        error!(controller = controller.name(), id = %id, error = %err, "fatal setup error, terminating runtime");
                        queue.finish(&id);
                        cancel.cancel();
                        return Err(err.clone());
                    }
                    Err(err) => {
                        let mut backoffs = backoffs.lock();
                        let backoff = backoffs.entry(id.clone()).or_default();
                        let delay = backoff.next_delay();
                        warn!(controller = controller.name(), id = %id, error = %err, delay_ms = delay.as_millis() as u64, "reconcile failed, backing off");
                        Some(delay)
                    }
                };

                queue.finish(&id);

                if let Some(delay) = requeue_delay {
                    let queue = queue.clone();
                    let id = id.clone();
                    let cancel = cancel.clone();
                    tokio::spawn(async move {
                        tokio::select! {
                            _ = cancel.cancelled() => {}
                            _ = tokio::time::sleep(delay) => queue.push(id),
                        }
                    });
                }
            }
        }));
    }

    for worker in workers {
        match worker.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err),
            Err(join_err) => {
                return Err(ReconcileError::FatalSetup(format!(
                    "qcontroller worker panicked: {join_err}"
                )))
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "qcontroller_tests.rs"]
mod tests;
