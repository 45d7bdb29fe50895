// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Update orchestrator.
//!
//! Runs one deployment end to end: announce a maintenance window, wait out
//! the notice period, stop the container, pull, start, verify health, and
//! record the new checkpoint. Any failure after the container was touched
//! rolls the working tree back and starts the container again.
//!
//! ```text
//! Idle ─► MaintenanceScheduled ─► NoticeElapsed ─► MaintenanceActive
//!                                                        │
//!      Committed ◄─ HealthVerified ◄─ ContainerStarted ◄─ CodePulled ◄─ ContainerStopped
//!
//!  pull / start / health failure ─► RollingBack ─► (container started again)
//! ```
//!
//! Whatever happens, maintenance is cleared before [`UpdateOrchestrator::perform_update`]
//! returns and at most one terminal alert is sent.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sentinel_maintenance::{MaintenanceStateMachine, MaintenanceStatus};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::commit_source::{CheckpointFile, CommitSource, short_sha, short_sha_or_unknown};
use crate::container::ContainerController;
use crate::notifier::{Alert, Notifier};
use crate::worktree::WorkTree;

/// Configuration for the update orchestrator.
#[derive(Debug, Clone)]
pub struct UpdateConfig {
    /// Branch to pull.
    pub branch: String,
    /// Time between announcing the update and stopping the container.
    pub notice: Duration,
    /// Expected length of the downtime, used as the announced window length.
    pub window_estimate: Duration,
    /// Wait after starting the container before the first health poll.
    pub settle_delay: Duration,
    /// Number of health polls before giving up.
    pub health_checks: u32,
    /// Delay between health polls.
    pub health_check_interval: Duration,
    /// Grace period for the container to stop before it is killed.
    pub stop_timeout: Duration,
    /// Log lines fetched when health verification fails.
    pub log_tail_lines: usize,
    /// Characters of those logs included in the failure alert.
    pub log_excerpt_chars: usize,
    /// Message stored in the maintenance record.
    pub message: String,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            branch: "main".to_string(),
            notice: Duration::from_secs(30 * 60),
            window_estimate: Duration::from_secs(15 * 60),
            settle_delay: Duration::from_secs(10),
            health_checks: 6,
            health_check_interval: Duration::from_secs(10),
            stop_timeout: Duration::from_secs(30),
            log_tail_lines: 50,
            log_excerpt_chars: 1500,
            message: "Automatic system update in progress".to_string(),
        }
    }
}

/// Progress of an update attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStage {
    /// Nothing done yet.
    Idle,
    /// Window stored as scheduled.
    MaintenanceScheduled,
    /// Notice period over.
    NoticeElapsed,
    /// Window stored as active.
    MaintenanceActive,
    /// Container stopped.
    ContainerStopped,
    /// New code in the working tree.
    CodePulled,
    /// Container running the new code.
    ContainerStarted,
    /// Health polls passed.
    HealthVerified,
    /// Checkpoint updated.
    Committed,
    /// Restoring the previous commit.
    RollingBack,
}

impl UpdateStage {
    /// Snake case name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateStage::Idle => "idle",
            UpdateStage::MaintenanceScheduled => "maintenance_scheduled",
            UpdateStage::NoticeElapsed => "notice_elapsed",
            UpdateStage::MaintenanceActive => "maintenance_active",
            UpdateStage::ContainerStopped => "container_stopped",
            UpdateStage::CodePulled => "code_pulled",
            UpdateStage::ContainerStarted => "container_started",
            UpdateStage::HealthVerified => "health_verified",
            UpdateStage::Committed => "committed",
            UpdateStage::RollingBack => "rolling_back",
        }
    }
}

impl fmt::Display for UpdateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an update attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// New commit deployed and checkpointed.
    Success,
    /// Failed before the container was stopped; nothing to undo.
    AbortedBeforeStop,
    /// Pull failed; the old code was started again.
    FailedPull,
    /// New code did not start; rolled back.
    FailedStart,
    /// New code never became healthy; rolled back.
    FailedHealth,
    /// Rolling back or starting the container again failed. Needs an operator.
    RollbackFailed,
    /// Shutdown requested during a wait.
    Cancelled,
}

impl UpdateOutcome {
    /// Whether the new commit is live.
    pub fn is_success(&self) -> bool {
        matches!(self, UpdateOutcome::Success)
    }

    /// Kebab case name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateOutcome::Success => "success",
            UpdateOutcome::AbortedBeforeStop => "aborted-before-stop",
            UpdateOutcome::FailedPull => "failed-pull",
            UpdateOutcome::FailedStart => "failed-start",
            UpdateOutcome::FailedHealth => "failed-health",
            UpdateOutcome::RollbackFailed => "rollback-failed",
            UpdateOutcome::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One in-flight attempt. Never persisted.
struct UpdateAttempt<'a> {
    previous: Option<&'a str>,
    target: &'a str,
    stage: UpdateStage,
}

impl<'a> UpdateAttempt<'a> {
    fn new(previous: Option<&'a str>, target: &'a str) -> Self {
        Self {
            previous,
            target,
            stage: UpdateStage::Idle,
        }
    }

    fn advance(&mut self, stage: UpdateStage) {
        info!(
            from = %self.stage,
            to = %stage,
            target = %short_sha(self.target),
            "Update stage"
        );
        self.stage = stage;
    }
}

/// Why an attempt stopped early.
struct Failure {
    outcome: UpdateOutcome,
    reason: String,
    logs: Option<String>,
}

impl Failure {
    fn new(outcome: UpdateOutcome, reason: impl Into<String>) -> Self {
        Self {
            outcome,
            reason: reason.into(),
            logs: None,
        }
    }

    fn with_logs(mut self, logs: String) -> Self {
        self.logs = Some(logs);
        self
    }

    fn cancelled() -> Self {
        Self::new(UpdateOutcome::Cancelled, "shutdown requested")
    }
}

enum HealthVerdict {
    Healthy,
    Exhausted,
    Cancelled,
}

/// Sleep for `duration` unless `cancel` fires first. Returns `false` when cancelled.
pub(crate) async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Sequences a single deployment.
pub struct UpdateOrchestrator {
    maintenance: MaintenanceStateMachine,
    container: Arc<dyn ContainerController>,
    worktree: Arc<dyn WorkTree>,
    commits: Arc<dyn CommitSource>,
    checkpoint: CheckpointFile,
    notifier: Arc<dyn Notifier>,
    config: UpdateConfig,
}

impl UpdateOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        maintenance: MaintenanceStateMachine,
        container: Arc<dyn ContainerController>,
        worktree: Arc<dyn WorkTree>,
        commits: Arc<dyn CommitSource>,
        checkpoint: CheckpointFile,
        notifier: Arc<dyn Notifier>,
        config: UpdateConfig,
    ) -> Self {
        Self {
            maintenance,
            container,
            worktree,
            commits,
            checkpoint,
            notifier,
            config,
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    /// Deploy `target`, rolling back to `previous` on failure.
    ///
    /// Never returns an error: every failure is logged, alerted, and folded
    /// into the outcome. Cancellation is honoured only while waiting, never
    /// while the container is stopped.
    pub async fn perform_update(
        &self,
        previous: Option<&str>,
        target: &str,
        cancel: &CancellationToken,
    ) -> UpdateOutcome {
        info!(
            previous = %short_sha_or_unknown(previous),
            target = %short_sha(target),
            branch = %self.config.branch,
            "Starting update"
        );

        let mut attempt = UpdateAttempt::new(previous, target);
        let result = self.run_attempt(&mut attempt, cancel).await;

        if let Err(e) = self.maintenance.clear().await {
            error!(error = %e, "Failed to clear maintenance after update");
        }

        match result {
            Ok(()) => {
                info!(
                    previous = %short_sha_or_unknown(previous),
                    deployed = %short_sha(target),
                    "Update completed"
                );
                self.notifier
                    .notify(Alert::update_succeeded(previous, target))
                    .await;
                UpdateOutcome::Success
            }
            Err(Failure {
                outcome: UpdateOutcome::Cancelled,
                ..
            }) => {
                warn!(stage = %attempt.stage, "Update cancelled by shutdown");
                UpdateOutcome::Cancelled
            }
            Err(Failure {
                outcome: UpdateOutcome::RollbackFailed,
                reason,
                logs,
            }) => {
                error!(
                    irrecoverable = true,
                    stage = %attempt.stage,
                    reason = %reason,
                    "Update failed and rollback failed"
                );
                self.notifier
                    .notify(Alert::rollback_failed(&reason, previous, logs.as_deref()))
                    .await;
                UpdateOutcome::RollbackFailed
            }
            Err(Failure {
                outcome: UpdateOutcome::AbortedBeforeStop,
                reason,
                ..
            }) => {
                error!(
                    stage = %attempt.stage,
                    reason = %reason,
                    "Update aborted before stopping the container"
                );
                self.notifier
                    .notify(Alert::update_aborted(&reason, previous))
                    .await;
                UpdateOutcome::AbortedBeforeStop
            }
            Err(Failure {
                outcome,
                reason,
                logs,
            }) => {
                error!(
                    outcome = %outcome,
                    stage = %attempt.stage,
                    reason = %reason,
                    "Update failed"
                );
                self.notifier
                    .notify(Alert::update_failed(&reason, previous, logs.as_deref()))
                    .await;
                outcome
            }
        }
    }

    async fn run_attempt(
        &self,
        attempt: &mut UpdateAttempt<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), Failure> {
        let (notice_start, notice_end) = self.notice_window(Utc::now())?;

        self.maintenance
            .set_maintenance(
                MaintenanceStatus::Scheduled,
                Some(self.config.message.clone()),
                Some(notice_start),
                Some(notice_end),
            )
            .await
            .map_err(|e| {
                Failure::new(
                    UpdateOutcome::AbortedBeforeStop,
                    format!("Failed to schedule maintenance: {e}"),
                )
            })?;
        attempt.advance(UpdateStage::MaintenanceScheduled);

        let headline = match self.commits.commit_info(attempt.target).await {
            Ok(info) => Some(info.headline().to_string()),
            Err(e) => {
                warn!(error = %e, "Could not fetch commit details for the announcement");
                None
            }
        };
        self.notifier
            .notify(Alert::update_scheduled(
                attempt.previous,
                attempt.target,
                self.config.notice,
                headline.as_deref(),
            ))
            .await;

        info!(
            notice_secs = self.config.notice.as_secs(),
            "Waiting out maintenance notice"
        );
        if !sleep_or_cancel(self.config.notice, cancel).await {
            return Err(Failure::cancelled());
        }
        attempt.advance(UpdateStage::NoticeElapsed);

        if let Err(e) = self
            .maintenance
            .set_maintenance(
                MaintenanceStatus::Active,
                Some(self.config.message.clone()),
                Some(Utc::now()),
                Some(notice_end),
            )
            .await
        {
            // the scheduled window turns active on its own when read
            warn!(error = %e, "Failed to mark maintenance active, continuing");
        }
        attempt.advance(UpdateStage::MaintenanceActive);

        self.container
            .stop(self.config.stop_timeout)
            .await
            .map_err(|e| {
                Failure::new(
                    UpdateOutcome::AbortedBeforeStop,
                    format!("Failed to stop container: {e}"),
                )
            })?;
        attempt.advance(UpdateStage::ContainerStopped);

        if let Err(e) = self.worktree.pull(&self.config.branch).await {
            let reason = format!("Git pull failed: {e}");
            return Err(self.recover(UpdateOutcome::FailedPull, reason, Ok(())).await);
        }
        attempt.advance(UpdateStage::CodePulled);

        if let Err(e) = self.container.start().await {
            let reason = format!("Container failed to start after update: {e}");
            attempt.advance(UpdateStage::RollingBack);
            let rollback = self.rollback_worktree(attempt.previous).await;
            return Err(self.recover(UpdateOutcome::FailedStart, reason, rollback).await);
        }
        attempt.advance(UpdateStage::ContainerStarted);

        match self.verify_health(cancel).await {
            HealthVerdict::Healthy => {}
            HealthVerdict::Cancelled => return Err(Failure::cancelled()),
            HealthVerdict::Exhausted => {
                let excerpt = self.log_excerpt().await;
                let reason = format!(
                    "Container failed health check after update ({} checks)",
                    self.config.health_checks
                );

                attempt.advance(UpdateStage::RollingBack);
                if let Err(e) = self.container.stop(self.config.stop_timeout).await {
                    warn!(error = %e, "Failed to stop unhealthy container before rollback");
                }
                let rollback = self.rollback_worktree(attempt.previous).await;
                let failure = self
                    .recover(UpdateOutcome::FailedHealth, reason, rollback)
                    .await;
                return Err(failure.with_logs(excerpt));
            }
        }
        attempt.advance(UpdateStage::HealthVerified);

        if let Err(e) = self.checkpoint.write(attempt.target).await {
            // the new code is live; the next drift check redeploys the same commit
            error!(
                error = %e,
                path = %self.checkpoint.path().display(),
                "Deployed but failed to write checkpoint"
            );
        }
        attempt.advance(UpdateStage::Committed);

        Ok(())
    }

    /// `(start, end)` of the announced window, starting after the notice.
    fn notice_window(
        &self,
        now: DateTime<Utc>,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), Failure> {
        let invalid = |what: &str| {
            Failure::new(
                UpdateOutcome::AbortedBeforeStop,
                format!("Invalid maintenance window: {what}"),
            )
        };

        let notice =
            chrono::Duration::from_std(self.config.notice).map_err(|_| invalid("notice out of range"))?;
        let estimate = chrono::Duration::from_std(self.config.window_estimate)
            .map_err(|_| invalid("estimate out of range"))?;

        let start = now
            .checked_add_signed(notice)
            .ok_or_else(|| invalid("start out of range"))?;
        let end = start
            .checked_add_signed(estimate)
            .ok_or_else(|| invalid("end out of range"))?;

        if start >= end {
            return Err(invalid("end is not after start"));
        }
        Ok((start, end))
    }

    async fn verify_health(&self, cancel: &CancellationToken) -> HealthVerdict {
        if !sleep_or_cancel(self.config.settle_delay, cancel).await {
            return HealthVerdict::Cancelled;
        }

        for check in 1..=self.config.health_checks {
            // an image health check still in its start period has not passed yet
            if matches!(self.container.status().await, Ok(status) if status.is_ready()) {
                info!(check, "Container healthy after update");
                return HealthVerdict::Healthy;
            }
            warn!(
                check,
                of = self.config.health_checks,
                "Container not healthy yet"
            );
            if check < self.config.health_checks
                && !sleep_or_cancel(self.config.health_check_interval, cancel).await
            {
                return HealthVerdict::Cancelled;
            }
        }
        HealthVerdict::Exhausted
    }

    async fn log_excerpt(&self) -> String {
        match self.container.logs(self.config.log_tail_lines).await {
            Ok(logs) => tail_chars(&logs, self.config.log_excerpt_chars).to_string(),
            Err(e) => format!("<logs unavailable: {e}>"),
        }
    }

    async fn rollback_worktree(&self, previous: Option<&str>) -> Result<(), String> {
        let Some(previous) = previous else {
            return Err("previous commit unknown, working tree left at the new revision".to_string());
        };

        warn!(to = %short_sha(previous), "Rolling back working tree");
        self.worktree
            .reset_hard(previous)
            .await
            .map_err(|e| e.to_string())
    }

    /// Start the container again after a failed step.
    ///
    /// The failure keeps `outcome` only when both the rollback and the start
    /// succeeded; otherwise the service is not known to be back up and it
    /// becomes [`UpdateOutcome::RollbackFailed`].
    async fn recover(
        &self,
        outcome: UpdateOutcome,
        reason: String,
        rollback: Result<(), String>,
    ) -> Failure {
        let mut problems = Vec::new();
        if let Err(e) = rollback {
            problems.push(format!("Rollback failed: {e}"));
        }
        if let Err(e) = self.container.start().await {
            error!(
                irrecoverable = true,
                error = %e,
                container = %self.container.container_name(),
                "Failed to start container during recovery"
            );
            problems.push(format!("Container could not be started again: {e}"));
        }

        if problems.is_empty() {
            Failure::new(outcome, reason)
        } else {
            Failure::new(
                UpdateOutcome::RollbackFailed,
                format!("{reason}\n{}", problems.join("\n")),
            )
        }
    }
}

/// Last `max` characters of `s`.
fn tail_chars(s: &str, max: usize) -> &str {
    let count = s.chars().count();
    if count <= max {
        return s;
    }
    match s.char_indices().nth(count - max) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}
