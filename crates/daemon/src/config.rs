// SPDX-License-Identifier: MIT

//! Runtime configuration: per-controller concurrency and interval knobs,
//! loadable from a TOML file with CLI overrides layered on top (`Cli` in
//! `main.rs`). Every field carries the same default the owning
//! controller module already uses when constructed bare, so an absent
//! config file reproduces that controller's own defaults exactly.

use omni_ctrl_controllers::cert_refresh_tick::DEFAULT_PERIOD_PRODUCTION as DEFAULT_TICK_PERIOD;
use omni_ctrl_controllers::config_patch_cleanup::DEFAULT_CHECK_INTERVAL as DEFAULT_CONFIG_PATCH_CLEANUP_INTERVAL;
use omni_ctrl_controllers::join_token_status::DEFAULT_CHECK_INTERVAL as DEFAULT_JOIN_TOKEN_STATUS_INTERVAL;
use omni_ctrl_controllers::k8s_node_auditor::DEFAULT_DELETE_OLDER_THAN;
use omni_ctrl_controllers::redacted_differ::{DEFAULT_DIFF_MAX_AGE, DEFAULT_DIFF_MAX_COUNT, DEFAULT_PRUNE_INTERVAL};
use omni_ctrl_controllers::talos_config::DEFAULT_CHECK_INTERVAL as DEFAULT_TALOS_CONFIG_INTERVAL;
use omni_ctrl_runtime::DEFAULT_CONCURRENCY;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, source: toml::de::Error },
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

fn default_cert_lifetime_ms() -> u64 {
    24 * 60 * 60 * 1000
}

fn default_delete_older_than_secs() -> u64 {
    DEFAULT_DELETE_OLDER_THAN.as_secs()
}

fn default_config_patch_cleanup_interval_secs() -> u64 {
    DEFAULT_CONFIG_PATCH_CLEANUP_INTERVAL.as_secs()
}

fn default_cert_refresh_tick_period_ms() -> u64 {
    DEFAULT_TICK_PERIOD.as_millis() as u64
}

fn default_talos_config_check_interval_secs() -> u64 {
    DEFAULT_TALOS_CONFIG_INTERVAL.as_secs()
}

fn default_join_token_status_check_interval_secs() -> u64 {
    DEFAULT_JOIN_TOKEN_STATUS_INTERVAL.as_secs()
}

fn default_redacted_config_prune_interval_secs() -> u64 {
    DEFAULT_PRUNE_INTERVAL.as_secs()
}

fn default_redacted_config_diff_max_age_secs() -> u64 {
    DEFAULT_DIFF_MAX_AGE.as_secs()
}

fn default_redacted_config_diff_max_count() -> usize {
    DEFAULT_DIFF_MAX_COUNT
}

/// Concurrency and interval knobs for every controller the daemon
/// registers. Field-level `serde(default = ...)` means a partial TOML
/// file only needs to name the knobs it wants to change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub machine_set_concurrency: usize,
    pub talos_upgrade_concurrency: usize,
    pub peer_pool_concurrency: usize,
    pub redacted_config_concurrency: usize,

    pub k8s_node_auditor_delete_older_than_secs: u64,
    pub config_patch_cleanup_check_interval_secs: u64,
    pub cert_refresh_tick_period_ms: u64,
    pub talos_config_check_interval_secs: u64,
    pub join_token_status_check_interval_secs: u64,
    pub redacted_config_prune_interval_secs: u64,
    pub redacted_config_diff_max_age_secs: u64,
    pub redacted_config_diff_max_count: usize,

    /// Lifetime handed to the certificate minter for each freshly minted
    /// client cert; the fake minter has no real CA to consult so this is
    /// the one cert-lifecycle parameter the daemon must supply itself.
    pub cert_lifetime_ms: u64,

    /// How long `run` waits for every controller task to join after
    /// cancellation before giving up and returning anyway.
    pub shutdown_timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            machine_set_concurrency: default_concurrency(),
            talos_upgrade_concurrency: default_concurrency(),
            peer_pool_concurrency: default_concurrency(),
            redacted_config_concurrency: default_concurrency(),
            k8s_node_auditor_delete_older_than_secs: default_delete_older_than_secs(),
            config_patch_cleanup_check_interval_secs: default_config_patch_cleanup_interval_secs(),
            cert_refresh_tick_period_ms: default_cert_refresh_tick_period_ms(),
            talos_config_check_interval_secs: default_talos_config_check_interval_secs(),
            join_token_status_check_interval_secs: default_join_token_status_check_interval_secs(),
            redacted_config_prune_interval_secs: default_redacted_config_prune_interval_secs(),
            redacted_config_diff_max_age_secs: default_redacted_config_diff_max_age_secs(),
            redacted_config_diff_max_count: default_redacted_config_diff_max_count(),
            cert_lifetime_ms: default_cert_lifetime_ms(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn delete_older_than(&self) -> Duration {
        Duration::from_secs(self.k8s_node_auditor_delete_older_than_secs)
    }

    pub fn config_patch_cleanup_check_interval(&self) -> Duration {
        Duration::from_secs(self.config_patch_cleanup_check_interval_secs)
    }

    pub fn cert_refresh_tick_period(&self) -> Duration {
        Duration::from_millis(self.cert_refresh_tick_period_ms)
    }

    pub fn talos_config_check_interval(&self) -> Duration {
        Duration::from_secs(self.talos_config_check_interval_secs)
    }

    pub fn join_token_status_check_interval(&self) -> Duration {
        Duration::from_secs(self.join_token_status_check_interval_secs)
    }

    pub fn redacted_config_prune_interval(&self) -> Duration {
        Duration::from_secs(self.redacted_config_prune_interval_secs)
    }

    pub fn redacted_config_diff_max_age(&self) -> Duration {
        Duration::from_secs(self.redacted_config_diff_max_age_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
