// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for sentinel-maintenance.

use thiserror::Error;

/// Storage errors surfaced by [`MaintenanceStore`](crate::store::MaintenanceStore)
/// implementations. The state machine never retries; callers decide.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The stored status column held a value outside the known set.
    #[error("Invalid maintenance status: {0}")]
    InvalidStatus(String),

    /// The backing store is unreachable (used by non-SQL stores).
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type using [`StorageError`].
pub type Result<T> = std::result::Result<T, StorageError>;
