// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! omni-ctrl-adapters: the trait boundaries for every external
//! collaborator the core calls out to (spec.md 1, 6) — the Talos gRPC
//! client, the Kubernetes client, the discovery service, the image
//! factory, the certificate mint routine and the WireGuard device. None
//! of these are implemented for real here; the `test-support` feature
//! ships fakes good enough to drive the controllers crate's tests.

pub mod cert;
pub mod discovery;
pub mod error;
pub mod image_factory;
pub mod kubernetes;
pub mod talos;
pub mod wireguard;

pub use cert::CertMinter;
pub use discovery::DiscoveryClient;
pub use error::AdapterError;
pub use image_factory::ImageFactoryClient;
pub use kubernetes::KubernetesClient;
pub use talos::{can_scale_down, EtcdMember, TalosMachineClient};
pub use wireguard::{PeerEvent, WireGuardHandler};
