// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! omni-ctrl-core: shared data model and primitives for the controller
//! reconciliation core — resource metadata, typed resource specs,
//! identifiers, the injectable clock, and the requeue/error vocabulary
//! every controller speaks.

pub mod clock;
pub mod error;
pub mod id;
pub mod ids;
pub mod labels;
pub mod meta;
pub mod requeue;
pub mod resources;

pub use clock::{Clock, FakeClock, SystemClock};
pub use error::ReconcileError;
pub use id::IdBuf;
pub use ids::{ClusterId, ConfigPatchId, JoinTokenId, LinkId, MachineId, MachineSetId, PendingMachineId};
pub use labels::LabelQuery;
pub use meta::{Meta, Phase};
pub use requeue::{Reconciled, ReconcileOutcome};
