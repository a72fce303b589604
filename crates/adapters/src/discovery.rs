// SPDX-License-Identifier: MIT

//! Discovery cluster service boundary (spec.md 6): removes an affiliate
//! (etcd member's discovery-service registration) when C4 finishes
//! destroying a ClusterMachine.

use crate::error::AdapterError;
use async_trait::async_trait;

#[async_trait]
pub trait DiscoveryClient: Send + Sync {
    async fn affiliate_delete(&self, cluster_id: &str, affiliate_id: &str) -> Result<(), AdapterError>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    pub struct FakeDiscoveryClient {
        pub deleted: Mutex<Vec<(String, String)>>,
    }

    impl FakeDiscoveryClient {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl DiscoveryClient for FakeDiscoveryClient {
        async fn affiliate_delete(&self, cluster_id: &str, affiliate_id: &str) -> Result<(), AdapterError> {
            self.deleted
                .lock()
                .push((cluster_id.to_string(), affiliate_id.to_string()));
            Ok(())
        }
    }
}
