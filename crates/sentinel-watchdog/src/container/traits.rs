// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Container controller trait and types.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors from container operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ContainerError {
    /// The container does not exist.
    #[error("Container not found: {0}")]
    NotFound(String),

    /// The container runtime is not installed or its daemon is unreachable.
    #[error("Container runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    /// The runtime command did not finish in time.
    #[error("Container command timed out after {0:?}")]
    Timeout(Duration),

    /// The runtime command exited non-zero.
    #[error("Container command failed (exit {exit_code}): {stderr}")]
    CommandFailed {
        /// Exit code, -1 when killed by a signal.
        exit_code: i32,
        /// Captured stderr.
        stderr: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ContainerError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ContainerError::NotFound(_) => ErrorKind::NotFound,
            ContainerError::Timeout(_) => ErrorKind::Timeout,
            _ => ErrorKind::TransientIo,
        }
    }
}

/// Result type for container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;

/// Lifecycle state reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerState {
    /// Process is running.
    Running,
    /// Process stopped.
    Exited,
    /// Runtime is restarting it.
    Restarting,
    /// Created but never started.
    Created,
    /// Paused.
    Paused,
    /// Dead.
    Dead,
    /// The container does not exist.
    NotFound,
    /// Anything else the runtime reports.
    Other(String),
}

impl ContainerState {
    /// Parse a runtime state string.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "running" => ContainerState::Running,
            "exited" => ContainerState::Exited,
            "restarting" => ContainerState::Restarting,
            "created" => ContainerState::Created,
            "paused" => ContainerState::Paused,
            "dead" => ContainerState::Dead,
            other => ContainerState::Other(other.to_string()),
        }
    }

    /// Display name.
    pub fn as_str(&self) -> &str {
        match self {
            ContainerState::Running => "running",
            ContainerState::Exited => "exited",
            ContainerState::Restarting => "restarting",
            ContainerState::Created => "created",
            ContainerState::Paused => "paused",
            ContainerState::Dead => "dead",
            ContainerState::NotFound => "not-found",
            ContainerState::Other(s) => s,
        }
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the image's own health check, when it defines one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    /// Within the start period.
    Starting,
    /// Passing.
    Healthy,
    /// Failing.
    Unhealthy,
}

/// Snapshot of the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatus {
    /// Lifecycle state
    pub state: ContainerState,
    /// Health check result, `None` when the image has no health check
    pub health: Option<HealthState>,
}

impl ContainerStatus {
    /// Status of a container that does not exist.
    pub fn not_found() -> Self {
        Self {
            state: ContainerState::NotFound,
            health: None,
        }
    }

    /// Running, with no health check or a passing one.
    pub fn running() -> Self {
        Self {
            state: ContainerState::Running,
            health: None,
        }
    }

    /// Whether the container counts as healthy.
    ///
    /// Running is enough unless the image's health check is failing.
    pub fn is_healthy(&self) -> bool {
        self.state == ContainerState::Running && self.health != Some(HealthState::Unhealthy)
    }

    /// Whether the container is running and its health check, if any, has
    /// passed. Unlike [`is_healthy`](Self::is_healthy), `starting` is not enough.
    pub fn is_ready(&self) -> bool {
        self.state == ContainerState::Running
            && matches!(self.health, None | Some(HealthState::Healthy))
    }

    /// Human readable summary, e.g. `running (unhealthy)`.
    pub fn describe(&self) -> String {
        match self.health {
            Some(HealthState::Starting) => format!("{} (starting)", self.state),
            Some(HealthState::Healthy) => format!("{} (healthy)", self.state),
            Some(HealthState::Unhealthy) => format!("{} (unhealthy)", self.state),
            None => self.state.to_string(),
        }
    }
}

/// Output of a command run inside the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    /// Exit code of the command
    pub exit_code: i32,
    /// Combined stdout and stderr
    pub output: String,
}

/// Controls the single managed container.
///
/// Implementations talk to a container runtime; they hold no watchdog state.
#[async_trait]
pub trait ContainerController: Send + Sync {
    /// Name of the managed container.
    fn container_name(&self) -> &str;

    /// Stop the container, killing it after `timeout`.
    async fn stop(&self, timeout: Duration) -> Result<()>;

    /// Start the container. Starting a running container succeeds.
    async fn start(&self) -> Result<()>;

    /// Restart the container, killing it after `timeout` if it does not stop.
    async fn restart(&self, timeout: Duration) -> Result<()>;

    /// Current status. A missing container is reported as
    /// [`ContainerState::NotFound`], not as an error.
    async fn status(&self) -> Result<ContainerStatus>;

    /// Last `tail_lines` lines of the container log.
    async fn logs(&self, tail_lines: usize) -> Result<String>;

    /// Run `command` inside the container with working directory `workdir`.
    async fn exec(&self, command: &[&str], workdir: &str) -> Result<ExecOutput>;

    /// Whether the container is healthy. Errors count as unhealthy.
    async fn is_healthy(&self) -> bool {
        matches!(self.status().await, Ok(status) if status.is_healthy())
    }
}
