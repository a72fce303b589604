// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! omni-ctrl-daemon: wires the resource store, the controller runtime
//! and all eleven controllers together into a runnable process
//! (spec.md 4.12) — the daemon's own contribution is construction and
//! configuration, not reconciliation logic, which lives entirely in
//! `omni-ctrl-controllers`.

pub mod config;
pub mod metrics;
pub mod wiring;

pub use config::RuntimeConfig;
pub use wiring::{build, Daemon};
