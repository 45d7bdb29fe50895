// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Health supervisor.
//!
//! The outer loop of the watchdog. Every tick it:
//!
//! 1. checks the container and restarts it when unhealthy, escalating the
//!    alert severity once failures pile up;
//! 2. once per day around the configured time, compares the deployed
//!    checkpoint with the branch head and hands drift to the
//!    [`UpdateOrchestrator`].
//!
//! Ticks run strictly one after another, including any update they trigger,
//! so two updates can never overlap. A failing tick is reported and the loop
//! carries on.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::commit_source::{CheckpointFile, CommitSource, short_sha, short_sha_or_unknown};
use crate::container::{ContainerController, ContainerState};
use crate::error::Result;
use crate::notifier::{Alert, Notifier, Severity};
use crate::orchestrator::{UpdateOrchestrator, sleep_or_cancel};

/// Configuration for the health supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Time between ticks.
    pub tick_interval: Duration,
    /// Wait after a restart before re-checking health.
    pub restart_grace: Duration,
    /// Grace period handed to the runtime on restart.
    pub restart_timeout: Duration,
    /// Consecutive failures at which the alert turns critical.
    pub escalation_threshold: u32,
    /// Time of day (UTC) of the drift check.
    pub update_check_time: NaiveTime,
    /// How far from `update_check_time` a tick may land and still run the check.
    pub update_check_tolerance: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            restart_grace: Duration::from_secs(10),
            restart_timeout: Duration::from_secs(30),
            escalation_threshold: 3,
            update_check_time: NaiveTime::from_hms_opt(3, 0, 0).unwrap_or(NaiveTime::MIN),
            update_check_tolerance: Duration::from_secs(5 * 60),
        }
    }
}

/// The supervision loop and the state it owns.
pub struct HealthSupervisor {
    container: Arc<dyn ContainerController>,
    commits: Arc<dyn CommitSource>,
    checkpoint: CheckpointFile,
    orchestrator: UpdateOrchestrator,
    notifier: Arc<dyn Notifier>,
    config: SupervisorConfig,
    consecutive_failures: u32,
    last_update_check: Option<NaiveDate>,
}

impl HealthSupervisor {
    /// Create a new supervisor.
    pub fn new(
        container: Arc<dyn ContainerController>,
        commits: Arc<dyn CommitSource>,
        checkpoint: CheckpointFile,
        orchestrator: UpdateOrchestrator,
        notifier: Arc<dyn Notifier>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            container,
            commits,
            checkpoint,
            orchestrator,
            notifier,
            config,
            consecutive_failures: 0,
            last_update_check: None,
        }
    }

    /// Unhealthy observations since the last healthy one.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Day of the last drift check slot that was handled.
    pub fn last_update_check(&self) -> Option<NaiveDate> {
        self.last_update_check
    }

    /// Run until `cancel` fires.
    ///
    /// The first tick runs immediately. An update in progress when `cancel`
    /// fires is abandoned at its next wait.
    pub async fn run(mut self, cancel: CancellationToken) {
        let update_check = self.config.update_check_time.format("%H:%M").to_string();
        info!(
            container = %self.container.container_name(),
            tick_interval_secs = self.config.tick_interval.as_secs(),
            update_check = %update_check,
            escalation_threshold = self.config.escalation_threshold,
            "Health supervisor started"
        );
        self.notifier
            .notify(Alert::supervisor_started(
                self.container.container_name(),
                self.config.tick_interval,
                &update_check,
            ))
            .await;

        loop {
            if let Err(e) = self.tick_at(Utc::now(), &cancel).await {
                error!(error = %e, kind = %e.kind(), "Supervisor tick failed");
                self.notifier.notify(Alert::tick_failed(&e.to_string())).await;
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Health supervisor received shutdown signal");
                    break;
                }

                _ = tokio::time::sleep(self.config.tick_interval) => {}
            }
        }

        self.notifier
            .notify(Alert::supervisor_stopped(self.container.container_name()))
            .await;
        info!("Health supervisor stopped");
    }

    /// One tick as if the clock read `now`.
    pub async fn tick_at(&mut self, now: DateTime<Utc>, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Ok(());
        }

        self.check_health(cancel).await;

        if let Some(slot) = self.due_update_check(now) {
            // marked before checking so a failing upstream is not retried all day
            self.last_update_check = Some(slot);
            self.check_for_update(cancel).await?;
        }
        Ok(())
    }

    /// Observe the container and remediate. Never fails the tick: a status
    /// query error counts as an unhealthy observation so a runtime outage
    /// still escalates.
    async fn check_health(&mut self, cancel: &CancellationToken) {
        let status = match self.container.status().await {
            Ok(status) => status,
            Err(e) => {
                self.consecutive_failures += 1;
                let severity = self.failure_severity();
                let container = self.container.container_name().to_string();
                error!(
                    container = %container,
                    error = %e,
                    kind = %e.kind(),
                    consecutive_failures = self.consecutive_failures,
                    severity = %severity,
                    "Container status unavailable"
                );
                self.notifier
                    .notify(Alert::container_unhealthy(
                        &container,
                        &format!("unknown ({e})"),
                        self.consecutive_failures,
                        severity,
                    ))
                    .await;
                return;
            }
        };

        if status.is_healthy() {
            if self.consecutive_failures > 0 {
                info!(
                    after_failures = self.consecutive_failures,
                    "Container healthy again"
                );
            } else {
                debug!("Container healthy");
            }
            self.consecutive_failures = 0;
            return;
        }

        self.consecutive_failures += 1;
        let severity = self.failure_severity();
        let container = self.container.container_name().to_string();
        warn!(
            container = %container,
            status = %status.describe(),
            consecutive_failures = self.consecutive_failures,
            severity = %severity,
            "Container unhealthy"
        );
        self.notifier
            .notify(Alert::container_unhealthy(
                &container,
                &status.describe(),
                self.consecutive_failures,
                severity,
            ))
            .await;

        let (action, result) = if status.state == ContainerState::NotFound {
            ("start", self.container.start().await)
        } else {
            (
                "restart",
                self.container.restart(self.config.restart_timeout).await,
            )
        };
        if let Err(e) = result {
            error!(container = %container, action, error = %e, "Remediation failed");
            self.notifier
                .notify(Alert::container_restart_failed(&container, &e.to_string()))
                .await;
            return;
        }

        if !sleep_or_cancel(self.config.restart_grace, cancel).await {
            return;
        }

        if self.container.is_healthy().await {
            info!(container = %container, action, "Container recovered");
            self.consecutive_failures = 0;
            self.notifier
                .notify(Alert::container_restarted(
                    &container,
                    &format!("Health check failed ({})", status.describe()),
                ))
                .await;
        } else {
            warn!(
                container = %container,
                consecutive_failures = self.consecutive_failures,
                "Container still unhealthy after remediation"
            );
        }
    }

    /// Severity of the alert for the current failure streak.
    ///
    /// Warning below the threshold, Critical exactly once when the streak
    /// reaches it, Error for every failure after that. The Critical tier pages
    /// an operator, so it fires at the crossing instead of on every tick of a
    /// long outage; supervision and restarts continue regardless.
    fn failure_severity(&self) -> Severity {
        let threshold = self.config.escalation_threshold.max(1);
        match self.consecutive_failures.cmp(&threshold) {
            std::cmp::Ordering::Less => Severity::Warning,
            std::cmp::Ordering::Equal => Severity::Critical,
            std::cmp::Ordering::Greater => Severity::Error,
        }
    }

    /// The day whose check slot `now` falls into, unless already handled.
    ///
    /// Slots on neighbouring days are considered too, so a check time close
    /// to midnight works with ticks on either side of it.
    fn due_update_check(&self, now: DateTime<Utc>) -> Option<NaiveDate> {
        let tolerance = chrono::Duration::from_std(self.config.update_check_tolerance).ok()?;
        let today = now.date_naive();

        [today.checked_sub_days(Days::new(1)), Some(today), today.checked_add_days(Days::new(1))]
            .into_iter()
            .flatten()
            .find(|day| {
                let slot = day.and_time(self.config.update_check_time).and_utc();
                (now - slot).abs() <= tolerance
            })
            .filter(|day| self.last_update_check != Some(*day))
    }

    async fn check_for_update(&mut self, cancel: &CancellationToken) -> Result<()> {
        info!("Running daily update check");

        let latest = match self.commits.latest_commit().await {
            Ok(sha) => sha,
            Err(e) => {
                warn!(error = %e, kind = %e.kind(), "Update check failed");
                self.notifier
                    .notify(Alert::update_check_failed(&e.to_string()))
                    .await;
                return Ok(());
            }
        };

        let current = self.checkpoint.read().await?;
        if current.as_deref() == Some(latest.as_str()) {
            info!(sha = %short_sha(&latest), "Already up to date");
            self.notifier.notify(Alert::up_to_date(&latest)).await;
            return Ok(());
        }

        info!(
            current = %short_sha_or_unknown(current.as_deref()),
            latest = %short_sha(&latest),
            "New commit available"
        );
        let outcome = self
            .orchestrator
            .perform_update(current.as_deref(), &latest, cancel)
            .await;
        info!(outcome = %outcome, "Update attempt finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit_source::mock::MockCommitSource;
    use crate::container::mock::ContainerCall;
    use crate::container::MockContainer;
    use crate::notifier::RecordingNotifier;
    use crate::orchestrator::UpdateConfig;
    use crate::worktree::MockWorkTree;
    use chrono::TimeZone;
    use sentinel_maintenance::{InMemoryMaintenanceStore, MaintenanceStateMachine};
    use tempfile::TempDir;

    struct Harness {
        supervisor: HealthSupervisor,
        container: Arc<MockContainer>,
        commits: Arc<MockCommitSource>,
        notifier: Arc<RecordingNotifier>,
        checkpoint: CheckpointFile,
        _dir: TempDir,
    }

    fn harness(container: MockContainer) -> Harness {
        let dir = TempDir::new().unwrap();
        let container = Arc::new(container);
        let commits = Arc::new(MockCommitSource::with_latest("bbb222"));
        let notifier = Arc::new(RecordingNotifier::new());
        let checkpoint = CheckpointFile::new(dir.path().join(".git_commit_sha"));

        let orchestrator = UpdateOrchestrator::new(
            MaintenanceStateMachine::new(Arc::new(InMemoryMaintenanceStore::new())),
            container.clone(),
            Arc::new(MockWorkTree::new("aaa111", "bbb222")),
            commits.clone(),
            checkpoint.clone(),
            notifier.clone(),
            UpdateConfig {
                notice: Duration::from_millis(1),
                settle_delay: Duration::from_millis(1),
                health_check_interval: Duration::from_millis(1),
                ..UpdateConfig::default()
            },
        );
        let supervisor = HealthSupervisor::new(
            container.clone(),
            commits.clone(),
            checkpoint.clone(),
            orchestrator,
            notifier.clone(),
            SupervisorConfig {
                restart_grace: Duration::from_millis(1),
                ..SupervisorConfig::default()
            },
        );

        Harness {
            supervisor,
            container,
            commits,
            notifier,
            checkpoint,
            _dir: dir,
        }
    }

    /// Noon, far from the 03:00 check.
    fn midday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, hour, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn test_healthy_tick_does_nothing() {
        let mut h = harness(MockContainer::running("python"));
        h.supervisor.tick_at(midday(), &CancellationToken::new()).await.unwrap();

        assert_eq!(h.supervisor.consecutive_failures(), 0);
        assert!(h.container.actions().is_empty());
        assert_eq!(h.notifier.count(), 0);
        assert_eq!(h.commits.latest_calls(), 0);
    }

    #[tokio::test]
    async fn test_restart_recovers_and_resets_counter() {
        let mut h = harness(MockContainer::stopped("python"));
        h.supervisor.tick_at(midday(), &CancellationToken::new()).await.unwrap();

        assert_eq!(h.supervisor.consecutive_failures(), 0);
        assert_eq!(h.container.actions(), vec![ContainerCall::Restart]);
        assert_eq!(
            h.notifier.titles(),
            vec!["Container Unhealthy", "Container Restarted"]
        );
    }

    #[tokio::test]
    async fn test_missing_container_is_started() {
        let mut h = harness(MockContainer::missing("python"));
        h.supervisor.tick_at(midday(), &CancellationToken::new()).await.unwrap();

        assert_eq!(h.container.actions(), vec![ContainerCall::Start]);
        assert!(h.container.is_running());
    }

    #[tokio::test]
    async fn test_escalates_exactly_at_threshold() {
        let mut h = harness(MockContainer::running("python"));
        h.container.set_stuck_unhealthy(true);
        let cancel = CancellationToken::new();

        let mut severities = Vec::new();
        for expected in 1..=4 {
            h.supervisor.tick_at(midday(), &cancel).await.unwrap();
            assert_eq!(h.supervisor.consecutive_failures(), expected);
            severities.push(h.notifier.last().unwrap().severity);
        }
        assert_eq!(
            severities,
            vec![
                Severity::Warning,
                Severity::Warning,
                Severity::Critical,
                Severity::Error
            ]
        );
        assert_eq!(h.notifier.count_severity(Severity::Critical), 1);

        h.container.set_stuck_unhealthy(false);
        h.supervisor.tick_at(midday(), &cancel).await.unwrap();
        assert_eq!(h.supervisor.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn test_restart_failure_is_reported() {
        let mut h = harness(MockContainer::stopped("python"));
        h.container.fail_next_restarts(1);
        h.supervisor.tick_at(midday(), &CancellationToken::new()).await.unwrap();

        assert_eq!(h.supervisor.consecutive_failures(), 1);
        assert_eq!(
            h.notifier.titles(),
            vec!["Container Unhealthy", "Container Restart Failed"]
        );
    }

    #[tokio::test]
    async fn test_status_error_counts_as_failure() {
        let mut h = harness(MockContainer::running("python"));
        h.container.set_status_error(true);
        let cancel = CancellationToken::new();

        let mut severities = Vec::new();
        for expected in 1..=3 {
            h.supervisor.tick_at(midday(), &cancel).await.unwrap();
            assert_eq!(h.supervisor.consecutive_failures(), expected);
            severities.push(h.notifier.last().unwrap().severity);
        }
        assert_eq!(
            severities,
            vec![Severity::Warning, Severity::Warning, Severity::Critical]
        );
        assert_eq!(h.notifier.titles(), vec!["Container Unhealthy"; 3]);

        // no remediation while the runtime cannot be queried
        assert!(h.container.actions().is_empty());

        h.container.set_status_error(false);
        h.supervisor.tick_at(midday(), &cancel).await.unwrap();
        assert_eq!(h.supervisor.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn test_status_error_does_not_skip_update_check() {
        let mut h = harness(MockContainer::running("python"));
        h.checkpoint.write("bbb222").await.unwrap();
        h.container.set_status_error(true);
        let cancel = CancellationToken::new();

        h.supervisor.tick_at(at(1, 2, 57), &cancel).await.unwrap();
        h.supervisor.tick_at(at(1, 3, 1), &cancel).await.unwrap();
        h.supervisor.tick_at(at(1, 3, 5), &cancel).await.unwrap();

        assert_eq!(h.commits.latest_calls(), 1);
        assert_eq!(
            h.supervisor.last_update_check(),
            NaiveDate::from_ymd_opt(2025, 6, 1)
        );
        assert!(h.notifier.titles().contains(&"No Update Needed".to_string()));
        assert_eq!(h.supervisor.consecutive_failures(), 3);
    }

    #[tokio::test]
    async fn test_update_check_runs_once_per_day() {
        let mut h = harness(MockContainer::running("python"));
        h.checkpoint.write("bbb222").await.unwrap();
        let cancel = CancellationToken::new();

        h.supervisor.tick_at(at(1, 2, 57), &cancel).await.unwrap();
        h.supervisor.tick_at(at(1, 3, 1), &cancel).await.unwrap();
        h.supervisor.tick_at(at(1, 3, 4), &cancel).await.unwrap();

        assert_eq!(h.commits.latest_calls(), 1);
        assert_eq!(h.notifier.titles(), vec!["No Update Needed"]);
        assert_eq!(
            h.supervisor.last_update_check(),
            NaiveDate::from_ymd_opt(2025, 6, 1)
        );

        // next day
        h.supervisor.tick_at(at(2, 3, 0), &cancel).await.unwrap();
        assert_eq!(h.commits.latest_calls(), 2);
    }

    #[tokio::test]
    async fn test_outside_tolerance_skips_check() {
        let mut h = harness(MockContainer::running("python"));
        let cancel = CancellationToken::new();
        h.supervisor.tick_at(at(1, 2, 54), &cancel).await.unwrap();
        h.supervisor.tick_at(at(1, 3, 6), &cancel).await.unwrap();
        assert_eq!(h.commits.latest_calls(), 0);
    }

    #[tokio::test]
    async fn test_check_slot_near_midnight() {
        let mut h = harness(MockContainer::running("python"));
        h.supervisor.config.update_check_time = NaiveTime::from_hms_opt(23, 58, 0).unwrap();
        h.checkpoint.write("bbb222").await.unwrap();
        let cancel = CancellationToken::new();

        // 00:01 on the 2nd belongs to the slot of the 1st
        h.supervisor.tick_at(at(2, 0, 1), &cancel).await.unwrap();
        assert_eq!(
            h.supervisor.last_update_check(),
            NaiveDate::from_ymd_opt(2025, 6, 1)
        );
        // the 2nd's own slot still runs
        h.supervisor.tick_at(at(2, 23, 58), &cancel).await.unwrap();
        assert_eq!(h.commits.latest_calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_check_marks_day_checked() {
        let mut h = harness(MockContainer::running("python"));
        h.commits.set_latest(None);
        let cancel = CancellationToken::new();

        h.supervisor.tick_at(at(1, 3, 0), &cancel).await.unwrap();
        h.supervisor.tick_at(at(1, 3, 1), &cancel).await.unwrap();

        assert_eq!(h.commits.latest_calls(), 1);
        assert_eq!(h.notifier.titles(), vec!["Update Check Failed"]);
    }

    #[tokio::test]
    async fn test_drift_triggers_update() {
        let mut h = harness(MockContainer::running("python"));
        h.checkpoint.write("aaa111").await.unwrap();

        h.supervisor
            .tick_at(at(1, 3, 0), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(h.checkpoint.read().await.unwrap().as_deref(), Some("bbb222"));
        assert_eq!(
            h.notifier.titles(),
            vec!["Maintenance Scheduled", "Update Successful"]
        );
    }

    #[tokio::test]
    async fn test_unknown_checkpoint_counts_as_drift() {
        let mut h = harness(MockContainer::running("python"));

        h.supervisor
            .tick_at(at(1, 3, 0), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(h.checkpoint.read().await.unwrap().as_deref(), Some("bbb222"));
        let last = h.notifier.last().unwrap();
        assert_eq!(last.field_value("Previous Version"), Some("unknown"));
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let h = harness(MockContainer::running("python"));
        let notifier = h.notifier.clone();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(h.supervisor.run(cancel.clone()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        handle.await.unwrap();

        let titles = notifier.titles();
        assert_eq!(titles.first().map(String::as_str), Some("Watchdog Started"));
        assert_eq!(titles.last().map(String::as_str), Some("Watchdog Stopped"));
    }
}
