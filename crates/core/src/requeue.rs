// SPDX-License-Identifier: MIT

//! The typed return value every reconcile produces (spec.md 9, "Requeue
//! signal"), used instead of exceptions to drive the runtime's
//! backoff/requeue scheduling.

use std::time::Duration;

/// Non-error outcome of one controller reconcile invocation. Errors are
/// carried by the surrounding `Result<ReconcileOutcome, E>` so controller
/// bodies can keep using `?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Work completed; no further scheduling needed until the next event.
    Ok,
    /// Nothing to do this cycle; existing outputs are left untouched.
    Skip,
    /// Re-run this item after the given delay even without a new event.
    Requeue(Duration),
}

impl ReconcileOutcome {
    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            ReconcileOutcome::Requeue(d) => Some(*d),
            _ => None,
        }
    }
}

/// What every controller's reconcile function returns.
pub type Reconciled<E> = Result<ReconcileOutcome, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requeue_after_only_set_for_requeue_variant() {
        assert_eq!(ReconcileOutcome::Ok.requeue_after(), None);
        assert_eq!(ReconcileOutcome::Skip.requeue_after(), None);
        assert_eq!(
            ReconcileOutcome::Requeue(Duration::from_secs(1)).requeue_after(),
            Some(Duration::from_secs(1))
        );
    }
}
