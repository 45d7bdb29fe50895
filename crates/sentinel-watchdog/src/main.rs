// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Sentinel Watchdog - keeps the bot container healthy and up to date.

use std::sync::Arc;

use sentinel_maintenance::{MaintenanceStateMachine, PgMaintenanceStore, schema};
use sentinel_watchdog::commit_source::{CheckpointFile, GitHubCommitSource};
use sentinel_watchdog::config::Config;
use sentinel_watchdog::container::DockerCli;
use sentinel_watchdog::notifier::WebhookNotifier;
use sentinel_watchdog::runtime::WatchdogRuntime;
use sentinel_watchdog::worktree::GitWorkTree;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env first so RUST_LOG from it applies
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sentinel_watchdog=info,sentinel_maintenance=info".into()),
        )
        .init();

    if let Err(e) = dotenv {
        warn!("No .env file loaded: {}", e);
    }

    let config = Config::from_env()?;

    info!(
        repo = %config.github.repo,
        branch = %config.github.branch,
        container = %config.container_name,
        repo_path = %config.repo_path.display(),
        update_check = %config.update_check_time.format("%H:%M"),
        webhook = config.webhook_url.is_some(),
        "Starting Sentinel Watchdog"
    );

    let pool = config.lazy_pool()?;

    // supervision must not depend on the database being up
    match schema::ensure_schema(&pool).await {
        Ok(()) => info!("Database schema verified"),
        Err(e) => warn!(
            error = %e,
            "Database unavailable, maintenance state writes will fail until it returns"
        ),
    }

    let maintenance = MaintenanceStateMachine::new(Arc::new(PgMaintenanceStore::new(pool.clone())));

    let runtime = WatchdogRuntime::builder()
        .maintenance(maintenance)
        .container(Arc::new(DockerCli::new(&config.container_name)))
        .worktree(Arc::new(GitWorkTree::new(&config.repo_path)))
        .commits(Arc::new(GitHubCommitSource::new(config.github.clone())?))
        .notifier(Arc::new(WebhookNotifier::new(config.webhook_url.clone())?))
        .checkpoint(CheckpointFile::new(&config.checkpoint_path))
        .update_config(config.update_config())
        .supervisor_config(config.supervisor_config())
        .build()?
        .start();

    info!("Watchdog ready");

    shutdown_signal().await?;
    info!("Shutdown signal received");

    runtime.shutdown().await?;
    pool.close().await;

    info!("Sentinel Watchdog shut down");

    Ok(())
}

/// Resolve on Ctrl-C, or SIGTERM on unix (what `docker stop` sends).
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}
