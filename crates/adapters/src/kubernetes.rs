// SPDX-License-Identifier: MIT

//! `CoreV1.Nodes` boundary consumed by C4's destroy path and C7's node
//! auditor (spec.md 6). The `kube`/`k8s-openapi` client construction is a
//! non-goal; this crate fixes only the method shape.

use crate::error::AdapterError;
use async_trait::async_trait;

#[async_trait]
pub trait KubernetesClient: Send + Sync {
    async fn delete_node(&self, cluster: &str, name: &str) -> Result<(), AdapterError>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    pub struct FakeKubernetesClient {
        pub deleted: Mutex<Vec<(String, String)>>,
        pub fail_for: Mutex<std::collections::HashSet<String>>,
    }

    impl FakeKubernetesClient {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl KubernetesClient for FakeKubernetesClient {
        async fn delete_node(&self, cluster: &str, name: &str) -> Result<(), AdapterError> {
            if self.fail_for.lock().contains(name) {
                return Err(AdapterError::Unavailable(format!("delete {name} failed")));
            }
            self.deleted.lock().push((cluster.to_string(), name.to_string()));
            Ok(())
        }
    }
}
