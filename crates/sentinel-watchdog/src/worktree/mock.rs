// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock working tree for testing.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{Result, WorkTree, WorkTreeError};

#[derive(Debug)]
struct MockState {
    head: String,
    upstream: String,
    fail_pulls: usize,
    fail_resets: usize,
    pulls: usize,
    resets: Vec<String>,
}

/// Working tree that tracks a head hash in memory.
///
/// `pull` moves the head to the configured upstream commit, `reset_hard`
/// moves it to the requested one.
#[derive(Debug)]
pub struct MockWorkTree {
    path: PathBuf,
    state: Mutex<MockState>,
}

impl MockWorkTree {
    /// Checkout at `head` whose remote branch points at `upstream`.
    pub fn new(head: &str, upstream: &str) -> Self {
        Self {
            path: PathBuf::from("/repo"),
            state: Mutex::new(MockState {
                head: head.to_string(),
                upstream: upstream.to_string(),
                fail_pulls: 0,
                fail_resets: 0,
                pulls: 0,
                resets: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current head.
    pub fn current_head(&self) -> String {
        self.lock().head.clone()
    }

    /// Move the remote branch.
    pub fn set_upstream(&self, sha: &str) {
        self.lock().upstream = sha.to_string();
    }

    /// Fail the next `n` pulls.
    pub fn fail_next_pulls(&self, n: usize) {
        self.lock().fail_pulls = n;
    }

    /// Fail the next `n` resets.
    pub fn fail_next_resets(&self, n: usize) {
        self.lock().fail_resets = n;
    }

    /// Number of pulls attempted.
    pub fn pull_count(&self) -> usize {
        self.lock().pulls
    }

    /// Targets of every reset attempted.
    pub fn resets(&self) -> Vec<String> {
        self.lock().resets.clone()
    }
}

#[async_trait]
impl WorkTree for MockWorkTree {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn pull(&self, _branch: &str) -> Result<String> {
        let mut state = self.lock();
        state.pulls += 1;
        if state.fail_pulls > 0 {
            state.fail_pulls -= 1;
            return Err(WorkTreeError::Failed {
                operation: "pull",
                exit_code: 1,
                stderr: "fatal: unable to access remote".to_string(),
            });
        }
        state.head = state.upstream.clone();
        Ok(format!("Updating to {}", state.head))
    }

    async fn reset_hard(&self, sha: &str) -> Result<()> {
        let mut state = self.lock();
        state.resets.push(sha.to_string());
        if state.fail_resets > 0 {
            state.fail_resets -= 1;
            return Err(WorkTreeError::Failed {
                operation: "reset",
                exit_code: 128,
                stderr: format!("fatal: ambiguous argument '{sha}'"),
            });
        }
        state.head = sha.to_string();
        Ok(())
    }

    async fn head(&self) -> Result<String> {
        Ok(self.current_head())
    }
}
