// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Deployed-commit checkpoint file.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::error::ErrorKind;

/// Errors reading or writing the checkpoint.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Filesystem error.
    #[error("Checkpoint I/O error at {}: {source}", path.display())]
    Io {
        /// Checkpoint path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl CheckpointError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::TransientIo
    }
}

/// File holding the hash of the last successfully deployed commit.
///
/// A missing or blank file means the deployed commit is unknown.
#[derive(Debug, Clone)]
pub struct CheckpointFile {
    path: PathBuf,
}

impl CheckpointFile {
    /// Checkpoint at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the checkpoint.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the deployed commit, `None` when absent or blank.
    pub async fn read(&self) -> Result<Option<String>, CheckpointError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                let sha = content.trim();
                Ok((!sha.is_empty()).then(|| sha.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Record `sha` as deployed.
    ///
    /// Writes a sibling temp file and renames it over the checkpoint so a
    /// reader never observes a partial hash.
    pub async fn write(&self, sha: &str) -> Result<(), CheckpointError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let tmp = self.temp_path();
        tokio::fs::write(&tmp, format!("{}\n", sha.trim()))
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        debug!(path = %self.path.display(), sha = %sha, "Checkpoint written");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "checkpoint".to_string());
        self.path.with_file_name(format!(".{name}.tmp"))
    }

    fn io_error(&self, source: io::Error) -> CheckpointError {
        CheckpointError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
