// SPDX-License-Identifier: MIT

//! Wires [`Store`] watch channels to registered controllers and drives
//! them to completion (spec.md 4.1, 4.12): each registered controller or
//! Q-controller gets its own feeder task translating watch events into
//! wakeups, plus its own driver task. A fatal error from any controller
//! cancels the whole runtime.

use crate::controller::{run_controller, Controller};
use crate::qcontroller::{run_qcontroller, InputMapper, QController};
use crate::queue::CoalescingQueue;
use omni_ctrl_core::ReconcileError;
use omni_ctrl_store::{Store, WatchEvent};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Default worker concurrency for a Q-controller (spec.md 4.1).
pub const DEFAULT_CONCURRENCY: usize = 1;
/// Upper bound on configurable Q-controller concurrency.
pub const MAX_CONCURRENCY: usize = 16;

pub fn clamp_concurrency(requested: usize) -> usize {
    requested.clamp(1, MAX_CONCURRENCY)
}

fn primary_id_of(event: &WatchEvent) -> Option<&str> {
    match event {
        WatchEvent::Created(r) | WatchEvent::Updated(r) | WatchEvent::TearingDown(r) => {
            Some(r.meta.id.as_str())
        }
        WatchEvent::Destroyed { id, .. } => Some(id.as_str()),
    }
}

/// An extra (non-primary) input a Q-controller reads, paired with the
/// function that maps one of its watch events to the primary ids it
/// should wake.
pub struct ExtraInput {
    pub namespace: String,
    pub kind: String,
    pub mapper: InputMapper,
}

/// Assembles the feeder + driver tasks for every registered controller
/// and runs them until cancellation or the first fatal error.
pub struct ControllerRuntime {
    store: Arc<dyn Store>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<Result<(), ReconcileError>>>,
}

impl ControllerRuntime {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Registers a plain controller, woken on every event on
    /// `(namespace, kind)`.
    pub fn spawn_controller(&mut self, controller: Arc<dyn Controller>, namespace: &str, kind: &str) {
        let (tx, rx) = mpsc::channel(64);
        self.spawn_feeder(namespace, kind, move |_event| {
            let _ = tx.try_send(());
        });
        let cancel = self.cancel.clone();
        self.tasks.push(tokio::spawn(run_controller(controller, rx, cancel)));
    }

    /// Registers a Q-controller whose primary ids come from
    /// `(primary_namespace, primary_kind)` plus any `extra_inputs` mapped
    /// back to primary ids.
    pub fn spawn_qcontroller(
        &mut self,
        controller: Arc<dyn QController>,
        concurrency: usize,
        primary_namespace: &str,
        primary_kind: &str,
        extra_inputs: Vec<ExtraInput>,
    ) {
        let queue = Arc::new(CoalescingQueue::new());

        {
            let queue = queue.clone();
            self.spawn_feeder(primary_namespace, primary_kind, move |event| {
                if let Some(id) = primary_id_of(event) {
                    queue.push(id.to_string());
                }
            });
        }

        for extra in extra_inputs {
            let queue = queue.clone();
            self.spawn_feeder(&extra.namespace, &extra.kind, move |event| {
                for id in (extra.mapper)(event) {
                    queue.push(id);
                }
            });
        }

        let cancel = self.cancel.clone();
        let concurrency = clamp_concurrency(concurrency);
        self.tasks
            .push(tokio::spawn(run_qcontroller(controller, queue, concurrency, cancel)));
    }

    /// Registers a controller with no watched inputs (C8/C9's tickers):
    /// it receives one immediate wakeup and, from then on, drives its own
    /// schedule entirely through `ReconcileOutcome::Requeue` (spec.md 9,
    /// "time-driven controllers").
    pub fn spawn_periodic(&mut self, controller: Arc<dyn Controller>) {
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.try_send(());
        let cancel = self.cancel.clone();
        self.tasks.push(tokio::spawn(run_controller(controller, rx, cancel)));
    }

    fn spawn_feeder(&mut self, namespace: &str, kind: &str, mut on_event: impl FnMut(&WatchEvent) + Send + 'static) {
        let mut watch = self.store.watch_kind(namespace, kind);
        let cancel = self.cancel.clone();
        self.tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(()),
                    received = watch.recv() => {
                        match received {
                            Ok(event) => on_event(&event),
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                warn!(skipped, "watch feeder lagged, dropped events");
                            }
                            Err(broadcast::error::RecvError::Closed) => return Ok(()),
                        }
                    }
                }
            }
        }));
    }

    /// Runs every registered task to completion. Returns the first fatal
    /// error encountered, having cancelled every other task.
    pub async fn run(mut self) -> Result<(), ReconcileError> {
        let mut result = Ok(());
        for task in self.tasks.drain(..) {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    self.cancel.cancel();
                    result = Err(err);
                }
                Err(join_err) => {
                    self.cancel.cancel();
                    result = Err(ReconcileError::FatalSetup(format!(
                        "runtime task panicked: {join_err}"
                    )));
                }
            }
        }
        result
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
