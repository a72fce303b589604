// SPDX-License-Identifier: MIT

//! WireGuard device control boundary consumed by the peer-pool manager
//! (C10). Applying changes to the actual WireGuard interface is a
//! non-goal; the pool only needs to notify this handler of add/remove
//! events for a public key.

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerEvent {
    pub public_key: String,
    pub deleted: bool,
}

#[async_trait]
pub trait WireGuardHandler: Send + Sync {
    async fn apply(&self, event: PeerEvent);
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    pub struct FakeWireGuardHandler {
        pub events: Mutex<Vec<PeerEvent>>,
    }

    impl FakeWireGuardHandler {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl WireGuardHandler for FakeWireGuardHandler {
        async fn apply(&self, event: PeerEvent) {
            self.events.lock().push(event);
        }
    }
}
