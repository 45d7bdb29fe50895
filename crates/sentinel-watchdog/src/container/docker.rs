// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Docker CLI backend.
//!
//! Shells out to `docker` so the watchdog only needs the socket mounted and
//! the client binary on `PATH`.

use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use super::traits::*;

/// Extra time granted to the CLI on top of the container's own stop timeout.
const CLI_SLACK: Duration = Duration::from_secs(30);

/// Controls a container through the `docker` CLI.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: PathBuf,
    container: String,
    command_timeout: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    status: String,
    health: Option<InspectHealth>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectHealth {
    status: String,
}

impl DockerCli {
    /// Control `container` with the `docker` binary on `PATH`.
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            binary: PathBuf::from("docker"),
            container: container.into(),
            command_timeout: Duration::from_secs(30),
        }
    }

    /// Use another client binary (e.g. `podman`).
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Timeout for commands that carry no timeout of their own.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Run the CLI and return its output whatever the exit status.
    async fn run_raw(&self, args: &[&str], timeout: Duration) -> Result<Output> {
        debug!(binary = %self.binary.display(), args = ?args, "Running container CLI");

        let mut cmd = Command::new(&self.binary);
        cmd.args(args).kill_on_drop(true);

        match tokio::time::timeout(timeout, cmd.output()).await {
            Err(_) => Err(ContainerError::Timeout(timeout)),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => Err(
                ContainerError::RuntimeUnavailable(format!("{} not found", self.binary.display())),
            ),
            Ok(Err(e)) => Err(e.into()),
            Ok(Ok(output)) => Ok(output),
        }
    }

    /// Run the CLI and map a non-zero exit to an error.
    async fn run(&self, args: &[&str], timeout: Duration) -> Result<Output> {
        let output = self.run_raw(args, timeout).await?;
        if output.status.success() {
            return Ok(output);
        }
        Err(self.classify_failure(&output))
    }

    fn classify_failure(&self, output: &Output) -> ContainerError {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let lower = stderr.to_ascii_lowercase();
        if lower.contains("no such container") || lower.contains("no such object") {
            ContainerError::NotFound(self.container.clone())
        } else if lower.contains("cannot connect to the docker daemon") {
            ContainerError::RuntimeUnavailable(stderr)
        } else {
            ContainerError::CommandFailed {
                exit_code: output.status.code().unwrap_or(-1),
                stderr,
            }
        }
    }
}

fn parse_inspect_state(raw: &[u8]) -> Result<ContainerStatus> {
    let state: InspectState = serde_json::from_slice(raw)?;
    let health = state
        .health
        .and_then(|h| match h.status.to_ascii_lowercase().as_str() {
            "starting" => Some(HealthState::Starting),
            "healthy" => Some(HealthState::Healthy),
            "unhealthy" => Some(HealthState::Unhealthy),
            _ => None,
        });
    Ok(ContainerStatus {
        state: ContainerState::parse(&state.status),
        health,
    })
}

#[async_trait]
impl ContainerController for DockerCli {
    fn container_name(&self) -> &str {
        &self.container
    }

    async fn stop(&self, timeout: Duration) -> Result<()> {
        let secs = timeout.as_secs().to_string();
        self.run(&["stop", "-t", secs.as_str(), self.container.as_str()], timeout + CLI_SLACK)
            .await?;
        info!(container = %self.container, "Container stopped");
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        self.run(&["start", self.container.as_str()], self.command_timeout)
            .await?;
        info!(container = %self.container, "Container started");
        Ok(())
    }

    async fn restart(&self, timeout: Duration) -> Result<()> {
        let secs = timeout.as_secs().to_string();
        self.run(&["restart", "-t", secs.as_str(), self.container.as_str()], timeout + CLI_SLACK)
            .await?;
        info!(container = %self.container, "Container restarted");
        Ok(())
    }

    async fn status(&self) -> Result<ContainerStatus> {
        let result = self
            .run(
                &["inspect", "--format", "{{json .State}}", self.container.as_str()],
                self.command_timeout,
            )
            .await;

        match result {
            Ok(output) => parse_inspect_state(&output.stdout),
            Err(ContainerError::NotFound(_)) => Ok(ContainerStatus::not_found()),
            Err(e) => Err(e),
        }
    }

    async fn logs(&self, tail_lines: usize) -> Result<String> {
        let tail = tail_lines.to_string();
        let output = self
            .run(&["logs", "--tail", tail.as_str(), self.container.as_str()], self.command_timeout)
            .await?;

        // the container's stderr stream comes back on our stderr
        let mut logs = String::from_utf8_lossy(&output.stdout).into_owned();
        logs.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(logs)
    }

    async fn exec(&self, command: &[&str], workdir: &str) -> Result<ExecOutput> {
        let mut args = vec!["exec", "-w", workdir, self.container.as_str()];
        args.extend_from_slice(command);

        let output = self.run_raw(&args, self.command_timeout).await?;
        let exit_code = output.status.code().unwrap_or(-1);

        // 125: docker itself failed (e.g. no such container)
        if exit_code == 125 {
            return Err(self.classify_failure(&output));
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(ExecOutput {
            exit_code,
            output: combined,
        })
    }
}
