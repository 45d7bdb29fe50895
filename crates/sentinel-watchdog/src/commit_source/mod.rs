// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Commit source abstraction.
//!
//! [`CommitSource`] answers "what is the newest commit on the tracked branch",
//! [`CheckpointFile`] remembers which commit is deployed. Drift between the
//! two is what triggers an update.

mod checkpoint;
mod github;
pub mod mock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ErrorKind;

pub use checkpoint::{CheckpointError, CheckpointFile};
pub use github::{GitHubCommitSource, GitHubConfig};

/// Placeholder rendered when a commit is not known.
pub const UNKNOWN_COMMIT: &str = "unknown";

/// Errors from a [`CommitSource`].
#[derive(Debug, Error)]
pub enum CommitSourceError {
    /// The request could not be sent or the response not read.
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Response status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// The response body did not carry the expected fields.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl CommitSourceError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommitSourceError::Request(e) if e.is_timeout() => ErrorKind::Timeout,
            CommitSourceError::Request(_) => ErrorKind::TransientIo,
            CommitSourceError::Status { status: 404, .. } => ErrorKind::NotFound,
            CommitSourceError::Status { .. } => ErrorKind::TransientIo,
            CommitSourceError::Malformed(_) => ErrorKind::TransientIo,
        }
    }
}

/// Descriptive data about one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Full commit hash.
    pub sha: String,
    /// Full commit message.
    pub message: String,
    /// Author name.
    pub author: String,
    /// Author date.
    pub date: Option<DateTime<Utc>>,
}

impl CommitInfo {
    /// First line of the commit message.
    pub fn headline(&self) -> &str {
        self.message.lines().next().unwrap_or("").trim()
    }
}

/// Read-only view of the tracked branch.
#[async_trait]
pub trait CommitSource: Send + Sync {
    /// Hash of the newest commit on the tracked branch.
    async fn latest_commit(&self) -> Result<String, CommitSourceError>;

    /// Details of `sha`.
    async fn commit_info(&self, sha: &str) -> Result<CommitInfo, CommitSourceError>;
}

/// First 8 characters of `sha`, as shown in alerts and logs.
pub fn short_sha(sha: &str) -> &str {
    sha.get(..8).unwrap_or(sha)
}

/// [`short_sha`] for an optional commit, rendering `None` as [`UNKNOWN_COMMIT`].
pub fn short_sha_or_unknown(sha: Option<&str>) -> &str {
    sha.map(short_sha).unwrap_or(UNKNOWN_COMMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_sha() {
        assert_eq!(short_sha("0123456789abcdef"), "01234567");
        assert_eq!(short_sha("abc"), "abc");
        assert_eq!(short_sha_or_unknown(None), "unknown");
        assert_eq!(short_sha_or_unknown(Some("aaa111aaa111")), "aaa111aa");
    }

    #[test]
    fn test_headline() {
        let info = CommitInfo {
            sha: "abc".to_string(),
            message: "Fix trade parser\n\nLonger body".to_string(),
            author: "dev".to_string(),
            date: None,
        };
        assert_eq!(info.headline(), "Fix trade parser");
    }

    #[test]
    fn test_not_found_status_kind() {
        let err = CommitSourceError::Status {
            status: 404,
            url: "http://x".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = CommitSourceError::Status {
            status: 502,
            url: "http://x".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::TransientIo);
    }
}
