// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Schema bootstrap for the maintenance table.
//!
//! The bot owns `bot_status` and runs its own DDL, so this is raw idempotent
//! SQL rather than a sqlx migrator (which would add `_sqlx_migrations` to a
//! database we do not own).

use sqlx::PgPool;

use crate::error::Result;

/// DDL for the `bot_status` table.
pub const SCHEMA_SQL: &str = include_str!("../migrations/schema.sql");

/// Create the `bot_status` table if it does not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
    Ok(())
}
