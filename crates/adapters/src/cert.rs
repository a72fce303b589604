// SPDX-License-Identifier: MIT

//! Certificate mint routine boundary (spec.md 1, 6), consumed by the
//! TalosConfig controller (C9). Key generation and signing are a
//! non-goal; this crate fixes only the shape the controller calls.

use crate::error::AdapterError;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintedCert {
    pub issued_at_ms: u64,
    pub lifetime_ms: u64,
}

#[async_trait]
pub trait CertMinter: Send + Sync {
    /// Mints a client certificate for `cluster`, signed by `signing_ca`.
    async fn mint_client_cert(&self, cluster: &str, signing_ca: &str, now_ms: u64) -> Result<MintedCert, AdapterError>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;

    pub struct FakeCertMinter {
        pub lifetime_ms: u64,
    }

    impl FakeCertMinter {
        pub fn new(lifetime_ms: u64) -> Self {
            Self { lifetime_ms }
        }
    }

    #[async_trait]
    impl CertMinter for FakeCertMinter {
        async fn mint_client_cert(&self, _cluster: &str, _signing_ca: &str, now_ms: u64) -> Result<MintedCert, AdapterError> {
            Ok(MintedCert {
                issued_at_ms: now_ms,
                lifetime_ms: self.lifetime_ms,
            })
        }
    }
}
