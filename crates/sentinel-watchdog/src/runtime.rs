// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embeddable runtime for sentinel-watchdog.
//!
//! [`WatchdogRuntime`] wires the adapters into an [`UpdateOrchestrator`] and a
//! [`HealthSupervisor`] and runs the supervisor on a background task.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sentinel_maintenance::{MaintenanceStateMachine, PgMaintenanceStore};
//! use sentinel_watchdog::runtime::WatchdogRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pool = sqlx::PgPool::connect("postgres://...").await?;
//!
//!     let runtime = WatchdogRuntime::builder()
//!         .maintenance(MaintenanceStateMachine::new(Arc::new(PgMaintenanceStore::new(pool))))
//!         .container(Arc::new(DockerCli::new("python")))
//!         .worktree(Arc::new(GitWorkTree::new("/repo")))
//!         .commits(Arc::new(GitHubCommitSource::new(github)?))
//!         .notifier(Arc::new(WebhookNotifier::new(webhook_url)?))
//!         .checkpoint(CheckpointFile::new("/repo/bot/.git_commit_sha"))
//!         .build()?
//!         .start();
//!
//!     tokio::signal::ctrl_c().await?;
//!     runtime.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use anyhow::Result;
use sentinel_maintenance::MaintenanceStateMachine;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::commit_source::{CheckpointFile, CommitSource};
use crate::container::ContainerController;
use crate::notifier::Notifier;
use crate::orchestrator::{UpdateConfig, UpdateOrchestrator};
use crate::supervisor::{HealthSupervisor, SupervisorConfig};
use crate::worktree::WorkTree;

/// Builder for [`WatchdogRuntime`].
#[derive(Default)]
pub struct WatchdogRuntimeBuilder {
    maintenance: Option<MaintenanceStateMachine>,
    container: Option<Arc<dyn ContainerController>>,
    worktree: Option<Arc<dyn WorkTree>>,
    commits: Option<Arc<dyn CommitSource>>,
    notifier: Option<Arc<dyn Notifier>>,
    checkpoint: Option<CheckpointFile>,
    update_config: UpdateConfig,
    supervisor_config: SupervisorConfig,
}

impl WatchdogRuntimeBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maintenance state machine (required).
    pub fn maintenance(mut self, maintenance: MaintenanceStateMachine) -> Self {
        self.maintenance = Some(maintenance);
        self
    }

    /// Set the container controller (required).
    pub fn container(mut self, container: Arc<dyn ContainerController>) -> Self {
        self.container = Some(container);
        self
    }

    /// Set the working tree (required).
    pub fn worktree(mut self, worktree: Arc<dyn WorkTree>) -> Self {
        self.worktree = Some(worktree);
        self
    }

    /// Set the commit source (required).
    pub fn commits(mut self, commits: Arc<dyn CommitSource>) -> Self {
        self.commits = Some(commits);
        self
    }

    /// Set the notifier (required).
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Set the checkpoint file (required).
    pub fn checkpoint(mut self, checkpoint: CheckpointFile) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    /// Override the orchestrator settings.
    pub fn update_config(mut self, config: UpdateConfig) -> Self {
        self.update_config = config;
        self
    }

    /// Override the supervisor settings.
    pub fn supervisor_config(mut self, config: SupervisorConfig) -> Self {
        self.supervisor_config = config;
        self
    }

    /// Validate and assemble the components.
    pub fn build(self) -> Result<WatchdogRuntimeConfig> {
        let maintenance = self
            .maintenance
            .ok_or_else(|| anyhow::anyhow!("maintenance is required"))?;
        let container = self
            .container
            .ok_or_else(|| anyhow::anyhow!("container is required"))?;
        let worktree = self
            .worktree
            .ok_or_else(|| anyhow::anyhow!("worktree is required"))?;
        let commits = self
            .commits
            .ok_or_else(|| anyhow::anyhow!("commits is required"))?;
        let notifier = self
            .notifier
            .ok_or_else(|| anyhow::anyhow!("notifier is required"))?;
        let checkpoint = self
            .checkpoint
            .ok_or_else(|| anyhow::anyhow!("checkpoint is required"))?;

        if self.supervisor_config.tick_interval.is_zero() {
            anyhow::bail!("tick_interval must be greater than zero");
        }

        let orchestrator = UpdateOrchestrator::new(
            maintenance,
            container.clone(),
            worktree,
            commits.clone(),
            checkpoint.clone(),
            notifier.clone(),
            self.update_config,
        );
        let supervisor = HealthSupervisor::new(
            container,
            commits,
            checkpoint,
            orchestrator,
            notifier,
            self.supervisor_config,
        );

        Ok(WatchdogRuntimeConfig { supervisor })
    }
}

/// A fully assembled watchdog, ready to start.
pub struct WatchdogRuntimeConfig {
    supervisor: HealthSupervisor,
}

impl WatchdogRuntimeConfig {
    /// Spawn the supervisor loop.
    pub fn start(self) -> WatchdogRuntime {
        let cancel = CancellationToken::new();
        let supervisor_handle = tokio::spawn(self.supervisor.run(cancel.clone()));
        info!("WatchdogRuntime started");
        WatchdogRuntime {
            supervisor_handle,
            cancel,
        }
    }
}

/// A running watchdog.
pub struct WatchdogRuntime {
    supervisor_handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl WatchdogRuntime {
    /// Create a new runtime builder.
    pub fn builder() -> WatchdogRuntimeBuilder {
        WatchdogRuntimeBuilder::new()
    }

    /// Token that stops the supervisor when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the supervisor and wait for it to exit.
    ///
    /// An update in progress is abandoned at its next wait; maintenance is
    /// still cleared on the way out.
    pub async fn shutdown(self) -> Result<()> {
        info!("WatchdogRuntime shutting down...");
        self.cancel.cancel();

        match self.supervisor_handle.await {
            Ok(()) => {
                info!("WatchdogRuntime shutdown complete");
                Ok(())
            }
            Err(e) => {
                error!("Supervisor task panicked: {}", e);
                Err(anyhow::anyhow!("supervisor task panicked: {}", e))
            }
        }
    }

    /// Whether the supervisor task is still running.
    pub fn is_running(&self) -> bool {
        !self.supervisor_handle.is_finished()
    }
}
