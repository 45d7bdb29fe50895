// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Storage seam for the singleton maintenance record.
//!
//! Stores only read and write the row. Deriving the effective status is the
//! job of [`MaintenanceStateMachine`](crate::state_machine::MaintenanceStateMachine).

pub mod memory;
pub mod postgres;

pub use self::memory::InMemoryMaintenanceStore;
pub use self::postgres::PgMaintenanceStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::record::MaintenanceRecord;

/// Persistence for the single maintenance row.
///
/// Writes are single upserts; no transaction spans two calls and concurrent
/// writers resolve as last-writer-wins.
#[async_trait]
pub trait MaintenanceStore: Send + Sync {
    /// Read the record, or `None` when the row has never been written.
    async fn load(&self) -> Result<Option<MaintenanceRecord>>;

    /// Insert or overwrite the record.
    async fn save(&self, record: &MaintenanceRecord) -> Result<()>;
}
