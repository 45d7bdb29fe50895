// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for sentinel-watchdog.

use std::fmt;

use sentinel_maintenance::StorageError;
use thiserror::Error;

use crate::commit_source::{CheckpointError, CommitSourceError};
use crate::container::ContainerError;
use crate::worktree::WorkTreeError;

/// Failure classes every adapter error maps onto.
///
/// The orchestrator and supervisor branch on these rather than on concrete
/// adapter errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Network or storage hiccup. The next tick retries.
    TransientIo,
    /// A bounded operation ran past its limit.
    Timeout,
    /// Container or commit does not exist.
    NotFound,
    /// Recovery itself failed; needs an operator.
    Irrecoverable,
}

impl ErrorKind {
    /// Short name used in logs and alerts.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::TransientIo => "transient_io",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Irrecoverable => "irrecoverable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Watchdog errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Database connection or bootstrap failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Maintenance record could not be read or written.
    #[error("Maintenance storage error: {0}")]
    Storage(#[from] StorageError),

    /// Container runtime operation failed.
    #[error("Container error: {0}")]
    Container(#[from] ContainerError),

    /// Git operation on the working tree failed.
    #[error("Working tree error: {0}")]
    WorkTree(#[from] WorkTreeError),

    /// Source control API call failed.
    #[error("Commit source error: {0}")]
    CommitSource(#[from] CommitSourceError),

    /// Checkpoint file could not be read or written.
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Irrecoverable,
            Error::Database(_) | Error::Storage(_) => ErrorKind::TransientIo,
            Error::Container(e) => e.kind(),
            Error::WorkTree(e) => e.kind(),
            Error::CommitSource(e) => e.kind(),
            Error::Checkpoint(e) => e.kind(),
            Error::Other(_) => ErrorKind::TransientIo,
        }
    }
}

/// Result type using watchdog [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
