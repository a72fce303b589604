// SPDX-License-Identifier: MIT

//! `omni-ctrld`: constructs the in-memory store, the adapter fakes and
//! the controller runtime, then runs until interrupted (spec.md 4.12).
//! Mirrors the teacher's startup ordering — construct adapters,
//! construct the runtime, register handlers, then start accepting
//! events — without the disk persistence or socket IPC that ordering
//! serves in the teacher's daemon; the resource store here is purely
//! in-memory (spec.md §1 non-goals) and the process is driven entirely
//! by `Ctrl-C`/`SIGTERM`.

use clap::Parser;
use omni_ctrl_core::SystemClock;
use omni_ctrl_daemon::{build, RuntimeConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "omni-ctrld", about = "Controller runtime core for a Talos-based cluster fleet")]
struct Cli {
    /// Path to a TOML config file. Omitted fields fall back to each
    /// controller's own default.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides `machine_set_concurrency` from the config file.
    #[arg(long)]
    machine_set_concurrency: Option<usize>,

    /// Overrides `shutdown_timeout_secs` from the config file.
    #[arg(long)]
    shutdown_timeout_secs: Option<u64>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(cli: &Cli) -> RuntimeConfig {
    let mut config = match &cli.config {
        Some(path) => match RuntimeConfig::load(path) {
            Ok(config) => config,
            Err(err) => {
                tracing::error!(error = %err, "failed to load config, falling back to defaults");
                RuntimeConfig::default()
            }
        },
        None => RuntimeConfig::default(),
    };
    if let Some(concurrency) = cli.machine_set_concurrency {
        config.machine_set_concurrency = concurrency;
    }
    if let Some(timeout) = cli.shutdown_timeout_secs {
        config.shutdown_timeout_secs = timeout;
    }
    config
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();
    let config = load_config(&cli);

    let store: Arc<dyn omni_ctrl_store::Store> = omni_ctrl_store::shared(SystemClock);
    let clock: Arc<dyn omni_ctrl_core::Clock> = Arc::new(SystemClock);
    let daemon = build(&config, store, clock);
    let cancel = daemon.runtime.cancellation_token();
    let shutdown_timeout = config.shutdown_timeout();

    tracing::info!("omni-ctrld started");
    let run_handle = tokio::spawn(daemon.runtime.run());

    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("received interrupt, shutting down");
    cancel.cancel();

    match tokio::time::timeout(shutdown_timeout, run_handle).await {
        Ok(Ok(Ok(()))) => {
            tracing::info!("omni-ctrld stopped");
            ExitCode::SUCCESS
        }
        Ok(Ok(Err(err))) => {
            tracing::error!(error = %err, "controller runtime exited with a fatal error");
            ExitCode::FAILURE
        }
        Ok(Err(join_err)) => {
            tracing::error!(error = %join_err, "controller runtime task panicked");
            ExitCode::FAILURE
        }
        Err(_) => {
            tracing::warn!(timeout_secs = shutdown_timeout.as_secs(), "controllers did not shut down within the timeout");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
