// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL maintenance store.
//!
//! Uses the `bot_status` table the bot already owns. Timestamps are read back
//! through `AT TIME ZONE 'UTC'` and rebuilt as UTC on this side, so session
//! time zone settings never leak into the record.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::PgPool;
use tracing::debug;

use super::MaintenanceStore;
use crate::error::{Result, StorageError};
use crate::record::{MaintenanceRecord, MaintenanceStatus, naive_to_utc};

/// Fixed primary key of the singleton row.
pub const MAINTENANCE_ROW_ID: i32 = 1;

/// Raw row as selected from `bot_status`.
#[derive(Debug, sqlx::FromRow)]
struct MaintenanceRow {
    maintenance_status: Option<String>,
    maintenance_message: Option<String>,
    maintenance_start: Option<NaiveDateTime>,
    maintenance_end: Option<NaiveDateTime>,
}

impl TryFrom<MaintenanceRow> for MaintenanceRecord {
    type Error = StorageError;

    fn try_from(row: MaintenanceRow) -> Result<Self> {
        // A row created by the bot before any window was set has a NULL status.
        let status = match row.maintenance_status.as_deref() {
            None | Some("") => MaintenanceStatus::Inactive,
            Some(raw) => raw.parse()?,
        };

        Ok(MaintenanceRecord {
            status,
            message: row.maintenance_message,
            start: row.maintenance_start.map(naive_to_utc),
            end: row.maintenance_end.map(naive_to_utc),
        })
    }
}

/// [`MaintenanceStore`] backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgMaintenanceStore {
    pool: PgPool,
}

impl PgMaintenanceStore {
    /// Create a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Access the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MaintenanceStore for PgMaintenanceStore {
    async fn load(&self) -> Result<Option<MaintenanceRecord>> {
        let row = sqlx::query_as::<_, MaintenanceRow>(
            r#"
            SELECT
                maintenance_status,
                maintenance_message,
                maintenance_start AT TIME ZONE 'UTC' AS maintenance_start,
                maintenance_end AT TIME ZONE 'UTC' AS maintenance_end
            FROM bot_status
            WHERE id = $1
            "#,
        )
        .bind(MAINTENANCE_ROW_ID)
        .fetch_optional(&self.pool)
        .await?;

        row.map(MaintenanceRecord::try_from).transpose()
    }

    async fn save(&self, record: &MaintenanceRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO bot_status (id, maintenance_status, maintenance_message, maintenance_start, maintenance_end)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                maintenance_status = EXCLUDED.maintenance_status,
                maintenance_message = EXCLUDED.maintenance_message,
                maintenance_start = EXCLUDED.maintenance_start,
                maintenance_end = EXCLUDED.maintenance_end
            "#,
        )
        .bind(MAINTENANCE_ROW_ID)
        .bind(record.status.as_str())
        .bind(record.message.as_deref())
        .bind(record.start)
        .bind(record.end)
        .execute(&self.pool)
        .await?;

        debug!(status = %record.status, "Maintenance record saved");
        Ok(())
    }
}
