// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Working tree the managed container runs its code from.

mod git;
pub mod mock;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::ErrorKind;

pub use git::GitWorkTree;
pub use mock::MockWorkTree;

/// Errors from working tree operations.
#[derive(Debug, Error)]
pub enum WorkTreeError {
    /// The git binary could not be executed.
    #[error("git not available: {0}")]
    GitUnavailable(String),

    /// The operation did not finish in time.
    #[error("git {operation} timed out after {after:?}")]
    Timeout {
        /// Operation name.
        operation: &'static str,
        /// Limit that was hit.
        after: Duration,
    },

    /// git exited non-zero.
    #[error("git {operation} failed (exit {exit_code}): {stderr}")]
    Failed {
        /// Operation name.
        operation: &'static str,
        /// Exit code, -1 when killed by a signal.
        exit_code: i32,
        /// Captured stderr.
        stderr: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkTreeError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkTreeError::Timeout { .. } => ErrorKind::Timeout,
            _ => ErrorKind::TransientIo,
        }
    }
}

/// Result type for working tree operations.
pub type Result<T> = std::result::Result<T, WorkTreeError>;

/// A git checkout the watchdog can move between commits.
#[async_trait]
pub trait WorkTree: Send + Sync {
    /// Location of the checkout.
    fn path(&self) -> &Path;

    /// Fetch and merge `branch` from `origin`. Returns git's output.
    async fn pull(&self, branch: &str) -> Result<String>;

    /// Move the checkout to `sha`, discarding local changes.
    async fn reset_hard(&self, sha: &str) -> Result<()>;

    /// Hash of the checked out commit.
    async fn head(&self) -> Result<String>;
}
