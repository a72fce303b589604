// SPDX-License-Identifier: MIT

use super::*;
use parking_lot::Mutex as PMutex;
use std::sync::atomic::{AtomicUsize, Ordering};

struct CountingController {
    calls: AtomicUsize,
    outcomes: PMutex<Vec<Reconciled<ReconcileError>>>,
}

#[async_trait]
impl Controller for CountingController {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn reconcile(&self) -> Reconciled<ReconcileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut outcomes = self.outcomes.lock();
        if outcomes.is_empty() {
            Ok(ReconcileOutcome::Ok)
        } else {
            outcomes.remove(0)
        }
    }
}

#[tokio::test]
async fn single_wakeup_triggers_one_reconcile() {
    let ctrl = Arc::new(CountingController {
        calls: AtomicUsize::new(0),
        outcomes: PMutex::new(vec![]),
    });
    let (tx, rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(run_controller(ctrl.clone(), rx, cancel.clone()));

    tx.send(()).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    cancel.cancel();
    handle.await.unwrap().unwrap();

    assert_eq!(ctrl.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn burst_of_wakeups_coalesces_into_one_reconcile() {
    let ctrl = Arc::new(CountingController {
        calls: AtomicUsize::new(0),
        outcomes: PMutex::new(vec![]),
    });
    let (tx, rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(run_controller(ctrl.clone(), rx, cancel.clone()));

    for _ in 0..5 {
        tx.send(()).await.unwrap();
    }
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    cancel.cancel();
    handle.await.unwrap().unwrap();

    assert_eq!(ctrl.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn requeue_outcome_schedules_another_reconcile_after_delay() {
    let ctrl = Arc::new(CountingController {
        calls: AtomicUsize::new(0),
        outcomes: PMutex::new(vec![Ok(ReconcileOutcome::Requeue(
            std::time::Duration::from_secs(5),
        ))]),
    });
    let (tx, rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(run_controller(ctrl.clone(), rx, cancel.clone()));

    tx.send(()).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    assert_eq!(ctrl.calls.load(Ordering::SeqCst), 1, "first pass requeues");

    tokio::time::advance(std::time::Duration::from_secs(6)).await;
    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    assert_eq!(ctrl.calls.load(Ordering::SeqCst), 2, "requeued pass ran");

    cancel.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn fatal_error_terminates_the_loop() {
    let ctrl = Arc::new(CountingController {
        calls: AtomicUsize::new(0),
        outcomes: PMutex::new(vec![Err(ReconcileError::FatalSetup("boom".into()))]),
    });
    let (tx, rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(run_controller(ctrl.clone(), rx, cancel.clone()));

    tx.send(()).await.unwrap();
    let result = handle.await.unwrap();
    assert!(result.is_err());
}
