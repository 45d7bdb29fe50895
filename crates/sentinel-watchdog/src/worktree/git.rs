// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! git CLI working tree.

use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use super::{Result, WorkTree, WorkTreeError};

/// Working tree driven through the `git` binary.
#[derive(Debug, Clone)]
pub struct GitWorkTree {
    binary: PathBuf,
    path: PathBuf,
    pull_timeout: Duration,
    reset_timeout: Duration,
}

impl GitWorkTree {
    /// Checkout at `path`. Pulls time out after 120s, resets after 60s.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            binary: PathBuf::from("git"),
            path: path.into(),
            pull_timeout: Duration::from_secs(120),
            reset_timeout: Duration::from_secs(60),
        }
    }

    /// Use another git binary.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Override the pull and reset timeouts.
    pub fn with_timeouts(mut self, pull: Duration, reset: Duration) -> Self {
        self.pull_timeout = pull;
        self.reset_timeout = reset;
        self
    }

    async fn git(&self, operation: &'static str, args: &[&str], timeout: Duration) -> Result<Output> {
        debug!(path = %self.path.display(), args = ?args, "Running git");

        let mut cmd = Command::new(&self.binary);
        cmd.args(args).current_dir(&self.path).kill_on_drop(true);

        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Err(_) => {
                return Err(WorkTreeError::Timeout {
                    operation,
                    after: timeout,
                });
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WorkTreeError::GitUnavailable(format!(
                    "{}: {e}",
                    self.binary.display()
                )));
            }
            Ok(result) => result?,
        };

        if !output.status.success() {
            return Err(WorkTreeError::Failed {
                operation,
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }
}

#[async_trait]
impl WorkTree for GitWorkTree {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn pull(&self, branch: &str) -> Result<String> {
        let output = self
            .git("pull", &["pull", "origin", branch], self.pull_timeout)
            .await?;
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        info!(branch = %branch, output = %stdout, "Pulled latest code");
        Ok(stdout)
    }

    async fn reset_hard(&self, sha: &str) -> Result<()> {
        self.git("reset", &["reset", "--hard", sha], self.reset_timeout)
            .await?;
        info!(sha = %sha, "Working tree reset");
        Ok(())
    }

    async fn head(&self) -> Result<String> {
        let output = self
            .git("rev-parse", &["rev-parse", "HEAD"], self.reset_timeout)
            .await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
