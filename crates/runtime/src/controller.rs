// SPDX-License-Identifier: MIT

//! Plain (non-Q) controller contract and driver loop (spec.md 4.1).
//!
//! Any watched event wakes the controller's run loop; the loop drains
//! pending wakeups and must be idempotent. The per-item state machine is:
//! `idle -> queued -> running -> (ok|skip -> idle) | (requeue(d) -> timer(d) -> queued) | (error -> backoff -> queued)`.

use crate::backoff::Backoff;
use async_trait::async_trait;
use omni_ctrl_core::{Reconciled, ReconcileError, ReconcileOutcome};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// A controller with no primary-input coalescing — it watches whatever
/// inputs it declares and re-reconciles on every wakeup.
#[async_trait]
pub trait Controller: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn reconcile(&self) -> Reconciled<ReconcileError>;
}

/// Drains every pending wakeup so a burst of events collapses into one
/// reconcile, matching the coalescing behavior Q-controllers get from
/// their work queue.
fn drain(rx: &mut mpsc::Receiver<()>) {
    while rx.try_recv().is_ok() {}
}

/// Runs `controller` until `cancel` fires or a fatal error is returned.
pub async fn run_controller(
    controller: Arc<dyn Controller>,
    mut wakeups: mpsc::Receiver<()>,
    cancel: CancellationToken,
) -> Result<(), ReconcileError> {
    let mut backoff = Backoff::new();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(controller = controller.name(), "cancelled, shutting down");
                return Ok(());
            }
            woken = wakeups.recv() => {
                if woken.is_none() {
                    return Ok(());
                }
                drain(&mut wakeups);
            }
        }

        loop {
            match controller.reconcile().await {
                Ok(ReconcileOutcome::Ok) | Ok(ReconcileOutcome::Skip) => {
                    backoff.reset();
                    break;
                }
                Ok(ReconcileOutcome::Requeue(delay)) => {
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    continue;
                }
                Err(err) => {
                    if err.is_fatal() {
                        error!(controller = controller.name(), error = %err, "fatal setup error, terminating runtime");
                        return Err(err);
                    }
                    let delay = backoff.next_delay();
                    warn!(controller = controller.name(), error = %err, delay_ms = delay.as_millis() as u64, "reconcile failed, backing off");
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    continue;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
