// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock commit source for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{CommitInfo, CommitSource, CommitSourceError};

/// Commit source returning a configurable head.
///
/// With no head set every call fails with HTTP 503.
#[derive(Debug, Default)]
pub struct MockCommitSource {
    latest: Mutex<Option<String>>,
    info_unavailable: Mutex<bool>,
    latest_calls: AtomicUsize,
}

impl MockCommitSource {
    /// Source whose branch head is `sha`.
    pub fn with_latest(sha: &str) -> Self {
        let source = Self::default();
        source.set_latest(Some(sha));
        source
    }

    /// Change the branch head, `None` to make lookups fail.
    pub fn set_latest(&self, sha: Option<&str>) {
        *self.latest.lock().unwrap_or_else(|e| e.into_inner()) = sha.map(str::to_string);
    }

    /// Make `commit_info` fail while `latest_commit` keeps working.
    pub fn set_info_unavailable(&self, unavailable: bool) {
        *self
            .info_unavailable
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = unavailable;
    }

    /// Number of `latest_commit` calls so far.
    pub fn latest_calls(&self) -> usize {
        self.latest_calls.load(Ordering::SeqCst)
    }

    fn unavailable() -> CommitSourceError {
        CommitSourceError::Status {
            status: 503,
            url: "mock://commits".to_string(),
        }
    }
}

#[async_trait]
impl CommitSource for MockCommitSource {
    async fn latest_commit(&self) -> Result<String, CommitSourceError> {
        self.latest_calls.fetch_add(1, Ordering::SeqCst);
        self.latest
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(Self::unavailable)
    }

    async fn commit_info(&self, sha: &str) -> Result<CommitInfo, CommitSourceError> {
        if *self
            .info_unavailable
            .lock()
            .unwrap_or_else(|e| e.into_inner())
        {
            return Err(Self::unavailable());
        }
        Ok(CommitInfo {
            sha: sha.to_string(),
            message: format!("Commit {sha}"),
            author: "mock".to_string(),
            date: None,
        })
    }
}
