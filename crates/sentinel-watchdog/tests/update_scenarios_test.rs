// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end update scenarios over mock adapters.

mod common;

use std::time::Duration;

use common::{Fixture, PREVIOUS, TARGET, fast_update_config};
use sentinel_maintenance::{Gate, MaintenanceRecord, MaintenanceStatus};
use sentinel_watchdog::{UpdateConfig, UpdateOutcome};
use tokio_util::sync::CancellationToken;

#[tokio::test(start_paused = true)]
async fn test_one_minute_notice_deploys_and_gates_users() {
    let fixture = Fixture::new().await;
    let orchestrator = fixture.orchestrator(UpdateConfig {
        notice: Duration::from_secs(60),
        ..UpdateConfig::default()
    });

    let update = tokio::spawn(async move {
        orchestrator
            .perform_update(Some(PREVIOUS), TARGET, &CancellationToken::new())
            .await
    });

    // during the notice the window is announced but users are not blocked
    tokio::time::sleep(Duration::from_secs(30)).await;
    let (status, _) = fixture.maintenance.derive_state().await.unwrap();
    assert_eq!(status, MaintenanceStatus::Scheduled);
    assert_eq!(fixture.maintenance.interaction_gate().await.unwrap(), Gate::Open);
    assert!(fixture.container.is_running());

    // after the notice, while the new code settles, users are blocked
    tokio::time::sleep(Duration::from_secs(35)).await;
    assert!(fixture.maintenance.is_in_maintenance().await.unwrap());
    assert!(matches!(
        fixture.maintenance.interaction_gate().await.unwrap(),
        Gate::Blocked { message } if message == "Automatic system update in progress"
    ));

    let outcome = update.await.unwrap();
    assert_eq!(outcome, UpdateOutcome::Success);

    assert_eq!(
        fixture.checkpoint.read().await.unwrap().as_deref(),
        Some(TARGET)
    );
    assert_eq!(
        fixture.store.snapshot().await.unwrap(),
        MaintenanceRecord::inactive()
    );
    assert_eq!(fixture.maintenance.interaction_gate().await.unwrap(), Gate::Open);

    let successes: Vec<_> = fixture
        .notifier
        .alerts()
        .into_iter()
        .filter(|a| a.title == "Update Successful")
        .collect();
    assert_eq!(successes.len(), 1);
    assert_eq!(successes[0].field_value("Previous Version"), Some(PREVIOUS));
    assert_eq!(successes[0].field_value("Current Version"), Some(TARGET));
}

/// Every failure mode after scheduling ends with exactly two alerts,
/// maintenance cleared and the container running.
#[tokio::test]
async fn test_every_failure_mode_is_reported_once_and_recovers() {
    type Inject = fn(&Fixture);
    let cases: [(&str, Inject, UpdateOutcome); 6] = [
        ("none", |_| {}, UpdateOutcome::Success),
        ("stop", |f| f.container.fail_next_stops(1), UpdateOutcome::AbortedBeforeStop),
        ("pull", |f| f.worktree.fail_next_pulls(1), UpdateOutcome::FailedPull),
        ("start", |f| f.container.fail_next_starts(1), UpdateOutcome::FailedStart),
        ("health", |f| f.container.queue_health([false; 6]), UpdateOutcome::FailedHealth),
        (
            "start+reset",
            |f| {
                f.container.fail_next_starts(1);
                f.worktree.fail_next_resets(1);
            },
            UpdateOutcome::RollbackFailed,
        ),
    ];

    for (name, inject, expected) in cases {
        let fixture = Fixture::new().await;
        inject(&fixture);
        let before = fixture.notifier.count();

        let outcome = fixture
            .orchestrator(fast_update_config())
            .perform_update(Some(PREVIOUS), TARGET, &CancellationToken::new())
            .await;

        assert_eq!(outcome, expected, "case {name}");
        assert_eq!(fixture.notifier.count() - before, 2, "case {name}");
        assert_eq!(
            fixture.store.snapshot().await.unwrap(),
            MaintenanceRecord::inactive(),
            "case {name}"
        );
        assert!(fixture.container.is_running(), "case {name}");

        let checkpoint = fixture.checkpoint.read().await.unwrap();
        if outcome.is_success() {
            assert_eq!(checkpoint.as_deref(), Some(TARGET), "case {name}");
        } else {
            assert_eq!(checkpoint.as_deref(), Some(PREVIOUS), "case {name}");
        }
    }
}

#[tokio::test]
async fn test_pull_failure_reports_reason() {
    let fixture = Fixture::new().await;
    fixture.worktree.fail_next_pulls(1);

    let outcome = fixture
        .orchestrator(fast_update_config())
        .perform_update(Some(PREVIOUS), TARGET, &CancellationToken::new())
        .await;

    assert_eq!(outcome, UpdateOutcome::FailedPull);
    let alert = fixture.notifier.last().unwrap();
    assert_eq!(alert.title, "Update Failed - Rollback Executed");
    assert!(
        alert
            .field_value("Error")
            .unwrap()
            .to_lowercase()
            .contains("pull failed")
    );
    assert!(fixture.container.is_running());
}

#[tokio::test]
async fn test_start_failure_restores_previous_commit() {
    let fixture = Fixture::new().await;
    fixture.container.fail_next_starts(1);

    let outcome = fixture
        .orchestrator(fast_update_config())
        .perform_update(Some(PREVIOUS), TARGET, &CancellationToken::new())
        .await;

    assert_eq!(outcome, UpdateOutcome::FailedStart);
    assert_eq!(fixture.worktree.current_head(), PREVIOUS);
    assert!(fixture.container.is_running());
}

#[tokio::test]
async fn test_health_exhaustion_keeps_old_checkpoint() {
    let fixture = Fixture::new().await;
    fixture.container.set_stuck_unhealthy(true);

    let outcome = fixture
        .orchestrator(fast_update_config())
        .perform_update(Some(PREVIOUS), TARGET, &CancellationToken::new())
        .await;

    assert_eq!(outcome, UpdateOutcome::FailedHealth);
    assert_eq!(fixture.worktree.resets(), vec![PREVIOUS.to_string()]);
    assert_eq!(
        fixture.checkpoint.read().await.unwrap().as_deref(),
        Some(PREVIOUS)
    );
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_settle_clears_maintenance() {
    let fixture = Fixture::new().await;
    let orchestrator = fixture.orchestrator(UpdateConfig {
        notice: Duration::from_secs(1),
        settle_delay: Duration::from_secs(60),
        ..UpdateConfig::default()
    });
    let cancel = CancellationToken::new();

    let update = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            orchestrator
                .perform_update(Some(PREVIOUS), TARGET, &cancel)
                .await
        })
    };

    tokio::time::sleep(Duration::from_secs(10)).await;
    cancel.cancel();

    assert_eq!(update.await.unwrap(), UpdateOutcome::Cancelled);
    assert!(fixture.container.is_running());
    assert_eq!(
        fixture.store.snapshot().await.unwrap(),
        MaintenanceRecord::inactive()
    );
    // checkpoint untouched, so the next drift check retries
    assert_eq!(
        fixture.checkpoint.read().await.unwrap().as_deref(),
        Some(PREVIOUS)
    );
    assert_eq!(fixture.notifier.titles(), vec!["Maintenance Scheduled"]);
}
