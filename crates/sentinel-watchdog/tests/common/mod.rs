// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for sentinel-watchdog scenario tests.
//!
//! Provides [`Fixture`], which wires every adapter to its in-memory mock and
//! keeps handles to them for assertions.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use sentinel_maintenance::{InMemoryMaintenanceStore, MaintenanceStateMachine};
use sentinel_watchdog::commit_source::CheckpointFile;
use sentinel_watchdog::commit_source::mock::MockCommitSource;
use sentinel_watchdog::container::MockContainer;
use sentinel_watchdog::notifier::RecordingNotifier;
use sentinel_watchdog::worktree::MockWorkTree;
use sentinel_watchdog::{
    HealthSupervisor, SupervisorConfig, UpdateConfig, UpdateOrchestrator,
};

pub const PREVIOUS: &str = "aaa111";
pub const TARGET: &str = "bbb222";

/// Mocks for every adapter plus the checkpoint in a temp dir.
pub struct Fixture {
    pub store: Arc<InMemoryMaintenanceStore>,
    pub maintenance: MaintenanceStateMachine,
    pub container: Arc<MockContainer>,
    pub worktree: Arc<MockWorkTree>,
    pub commits: Arc<MockCommitSource>,
    pub notifier: Arc<RecordingNotifier>,
    pub checkpoint: CheckpointFile,
    _temp_dir: tempfile::TempDir,
}

impl Fixture {
    /// Deployed `PREVIOUS`, upstream at `TARGET`, container running.
    pub async fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("temp dir");
        let checkpoint = CheckpointFile::new(temp_dir.path().join("bot").join(".git_commit_sha"));
        checkpoint.write(PREVIOUS).await.expect("seed checkpoint");

        let store = Arc::new(InMemoryMaintenanceStore::new());
        Self {
            maintenance: MaintenanceStateMachine::new(store.clone()),
            store,
            container: Arc::new(MockContainer::running("python")),
            worktree: Arc::new(MockWorkTree::new(PREVIOUS, TARGET)),
            commits: Arc::new(MockCommitSource::with_latest(TARGET)),
            notifier: Arc::new(RecordingNotifier::new()),
            checkpoint,
            _temp_dir: temp_dir,
        }
    }

    pub fn orchestrator(&self, config: UpdateConfig) -> UpdateOrchestrator {
        UpdateOrchestrator::new(
            self.maintenance.clone(),
            self.container.clone(),
            self.worktree.clone(),
            self.commits.clone(),
            self.checkpoint.clone(),
            self.notifier.clone(),
            config,
        )
    }

    pub fn supervisor(&self, update: UpdateConfig, config: SupervisorConfig) -> HealthSupervisor {
        HealthSupervisor::new(
            self.container.clone(),
            self.commits.clone(),
            self.checkpoint.clone(),
            self.orchestrator(update),
            self.notifier.clone(),
            config,
        )
    }
}

/// Orchestrator settings with millisecond waits.
pub fn fast_update_config() -> UpdateConfig {
    UpdateConfig {
        notice: Duration::from_millis(5),
        settle_delay: Duration::from_millis(1),
        health_check_interval: Duration::from_millis(1),
        ..UpdateConfig::default()
    }
}

/// Supervisor settings with a millisecond restart grace.
pub fn fast_supervisor_config() -> SupervisorConfig {
    SupervisorConfig {
        restart_grace: Duration::from_millis(1),
        ..SupervisorConfig::default()
    }
}
