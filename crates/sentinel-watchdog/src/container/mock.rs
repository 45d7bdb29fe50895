// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock container controller for testing.
//!
//! Tracks a running flag in memory and records every call, so tests can
//! assert both the final state and the order of operations.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::traits::*;

/// A call received by [`MockContainer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerCall {
    /// `stop`
    Stop,
    /// `start`
    Start,
    /// `restart`
    Restart,
    /// `status`
    Status,
    /// `logs`
    Logs,
    /// `exec`
    Exec,
}

#[derive(Debug)]
struct MockState {
    exists: bool,
    running: bool,
    stuck_unhealthy: bool,
    health_script: VecDeque<bool>,
    starting_polls: usize,
    fail_stops: usize,
    fail_starts: usize,
    fail_restarts: usize,
    status_error: bool,
    logs: String,
    calls: Vec<ContainerCall>,
}

/// In-memory container controller.
#[derive(Debug)]
pub struct MockContainer {
    name: String,
    state: Mutex<MockState>,
}

impl MockContainer {
    /// A running, healthy container.
    pub fn running(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(MockState {
                exists: true,
                running: true,
                stuck_unhealthy: false,
                health_script: VecDeque::new(),
                starting_polls: 0,
                fail_stops: 0,
                fail_starts: 0,
                fail_restarts: 0,
                status_error: false,
                logs: String::new(),
                calls: Vec::new(),
            }),
        }
    }

    /// A container that is not running.
    pub fn stopped(name: &str) -> Self {
        let mock = Self::running(name);
        mock.lock().running = false;
        mock
    }

    /// A container that does not exist until started.
    pub fn missing(name: &str) -> Self {
        let mock = Self::stopped(name);
        mock.lock().exists = false;
        mock
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Report unhealthy regardless of the running flag until cleared.
    pub fn set_stuck_unhealthy(&self, stuck: bool) {
        self.lock().stuck_unhealthy = stuck;
    }

    /// Health answers for the next `status` calls, before falling back to
    /// the running flag.
    pub fn queue_health(&self, answers: impl IntoIterator<Item = bool>) {
        self.lock().health_script.extend(answers);
    }

    /// Report the image health check as `starting` for the next `n` healthy
    /// `status` calls.
    pub fn report_starting(&self, n: usize) {
        self.lock().starting_polls = n;
    }

    /// Fail the next `n` stops.
    pub fn fail_next_stops(&self, n: usize) {
        self.lock().fail_stops = n;
    }

    /// Fail the next `n` starts.
    pub fn fail_next_starts(&self, n: usize) {
        self.lock().fail_starts = n;
    }

    /// Fail the next `n` restarts.
    pub fn fail_next_restarts(&self, n: usize) {
        self.lock().fail_restarts = n;
    }

    /// Make `status` return a runtime error.
    pub fn set_status_error(&self, fail: bool) {
        self.lock().status_error = fail;
    }

    /// Text returned by `logs`.
    pub fn set_logs(&self, logs: &str) {
        self.lock().logs = logs.to_string();
    }

    /// Whether the container is currently running.
    pub fn is_running(&self) -> bool {
        let state = self.lock();
        state.exists && state.running
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<ContainerCall> {
        self.lock().calls.clone()
    }

    /// Calls received so far, excluding `status` polls.
    pub fn actions(&self) -> Vec<ContainerCall> {
        self.calls()
            .into_iter()
            .filter(|c| *c != ContainerCall::Status)
            .collect()
    }

    fn take_failure(counter: &mut usize) -> bool {
        if *counter > 0 {
            *counter -= 1;
            true
        } else {
            false
        }
    }

    fn injected() -> ContainerError {
        ContainerError::CommandFailed {
            exit_code: 1,
            stderr: "injected failure".to_string(),
        }
    }
}

#[async_trait]
impl ContainerController for MockContainer {
    fn container_name(&self) -> &str {
        &self.name
    }

    async fn stop(&self, _timeout: Duration) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(ContainerCall::Stop);
        if !state.exists {
            return Err(ContainerError::NotFound(self.name.clone()));
        }
        if Self::take_failure(&mut state.fail_stops) {
            return Err(Self::injected());
        }
        state.running = false;
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(ContainerCall::Start);
        if Self::take_failure(&mut state.fail_starts) {
            return Err(Self::injected());
        }
        state.exists = true;
        state.running = true;
        Ok(())
    }

    async fn restart(&self, _timeout: Duration) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(ContainerCall::Restart);
        if !state.exists {
            return Err(ContainerError::NotFound(self.name.clone()));
        }
        if Self::take_failure(&mut state.fail_restarts) {
            return Err(Self::injected());
        }
        state.running = true;
        Ok(())
    }

    async fn status(&self) -> Result<ContainerStatus> {
        let mut state = self.lock();
        state.calls.push(ContainerCall::Status);
        if state.status_error {
            return Err(ContainerError::RuntimeUnavailable(
                "injected status failure".to_string(),
            ));
        }
        if !state.exists {
            return Ok(ContainerStatus::not_found());
        }

        let healthy = match state.health_script.pop_front() {
            Some(answer) => answer,
            None => state.running && !state.stuck_unhealthy,
        };

        Ok(match (state.running, healthy) {
            (true, true) if state.starting_polls > 0 => {
                state.starting_polls -= 1;
                ContainerStatus {
                    state: ContainerState::Running,
                    health: Some(HealthState::Starting),
                }
            }
            (true, true) => ContainerStatus::running(),
            (true, false) => ContainerStatus {
                state: ContainerState::Running,
                health: Some(HealthState::Unhealthy),
            },
            (false, _) => ContainerStatus {
                state: ContainerState::Exited,
                health: None,
            },
        })
    }

    async fn logs(&self, _tail_lines: usize) -> Result<String> {
        let mut state = self.lock();
        state.calls.push(ContainerCall::Logs);
        Ok(state.logs.clone())
    }

    async fn exec(&self, command: &[&str], _workdir: &str) -> Result<ExecOutput> {
        let mut state = self.lock();
        state.calls.push(ContainerCall::Exec);
        if !state.running {
            return Err(ContainerError::CommandFailed {
                exit_code: 125,
                stderr: format!("container {} is not running", self.name),
            });
        }
        Ok(ExecOutput {
            exit_code: 0,
            output: command.join(" "),
        })
    }
}
