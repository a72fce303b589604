// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! omni-ctrl-runtime: the controller/Q-controller execution engine
//! (spec.md 4, component C2) plus the shared reconciliation primitives
//! every concrete controller builds on (component C3).

pub mod backoff;
pub mod controller;
pub mod primitives;
pub mod qcontroller;
pub mod queue;
pub mod scheduler;

pub use backoff::Backoff;
pub use controller::{run_controller, Controller};
pub use primitives::{fingerprint_inputs, teardown_and_destroy, INPUT_FINGERPRINT_ANNOTATION};
pub use qcontroller::{run_qcontroller, InputMapper, QController};
pub use queue::CoalescingQueue;
pub use scheduler::{clamp_concurrency, ControllerRuntime, ExtraInput, DEFAULT_CONCURRENCY, MAX_CONCURRENCY};
