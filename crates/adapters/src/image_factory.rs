// SPDX-License-Identifier: MIT

//! Image factory HTTP client boundary (spec.md 6). Consumed by the
//! machine-status reconciler, which sits outside this core's scope; kept
//! here so the daemon can wire a concrete client alongside the others.

use crate::error::AdapterError;
use async_trait::async_trait;

#[async_trait]
pub trait ImageFactoryClient: Send + Sync {
    async fn ensure_schematic(&self, schematic: &str) -> Result<(String, String), AdapterError>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;

    #[derive(Default)]
    pub struct FakeImageFactoryClient;

    #[async_trait]
    impl ImageFactoryClient for FakeImageFactoryClient {
        async fn ensure_schematic(&self, schematic: &str) -> Result<(String, String), AdapterError> {
            Ok((format!("full-{schematic}"), format!("plain-{schematic}")))
        }
    }
}
