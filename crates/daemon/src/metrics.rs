// SPDX-License-Identifier: MIT

//! Minimal observability seam (spec.md §1.1 expansion): a trait the
//! runtime could report reconcile outcomes and queue depth through, with
//! a no-op default. Not wired to any real backend — carried the way the
//! teacher carries `oj-engine::usage_metrics` even where a distilled
//! spec never asks for it.

use omni_ctrl_core::ReconcileOutcome;

pub trait RuntimeMetrics: Send + Sync {
    fn record_outcome(&self, controller: &str, outcome: &ReconcileOutcome);
    fn record_queue_depth(&self, controller: &str, depth: usize);
}

pub struct NoopMetrics;

impl RuntimeMetrics for NoopMetrics {
    fn record_outcome(&self, _controller: &str, _outcome: &ReconcileOutcome) {}
    fn record_queue_depth(&self, _controller: &str, _depth: usize) {}
}
