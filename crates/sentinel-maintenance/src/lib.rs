// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Sentinel Maintenance - Shared Maintenance Window
//!
//! This crate owns the single maintenance record that decides whether the
//! supervised bot accepts user interactions. The watchdog writes it when it
//! schedules an update; the bot polls it before every interaction. Both go
//! through [`MaintenanceStateMachine`], which heals a stale stored status on
//! read so a scheduled window opens and closes on its own.
//!
//! # Record
//!
//! | Field | Type | Notes |
//! |-------|------|-------|
//! | `status` | `inactive` / `scheduled` / `active` | reconciled on read |
//! | `message` | text, optional | shown to blocked users |
//! | `start` | timestamptz, optional | always UTC |
//! | `end` | timestamptz, optional | always UTC |
//!
//! # Derivation
//!
//! | Condition (first match wins) | Effective status |
//! |------------------------------|------------------|
//! | no row | `inactive` |
//! | `end` set and `now >= end` | `inactive` |
//! | `start` set and `now >= start` | `active` |
//! | `start` set and `now < start` | `scheduled` |
//! | otherwise | `inactive` |
//!
//! # Modules
//!
//! - [`error`]: Storage error type
//! - [`record`]: Record and status types, UTC coercion
//! - [`schema`]: `bot_status` DDL bootstrap
//! - [`state_machine`]: Derive-on-read state machine and interaction gate
//! - [`store`]: Storage seam with PostgreSQL and in-memory backends

#![deny(missing_docs)]

/// Storage error type.
pub mod error;

/// Maintenance record and status types.
pub mod record;

/// DDL bootstrap for the `bot_status` table.
pub mod schema;

/// Derive-on-read maintenance state machine.
pub mod state_machine;

/// Storage backends for the singleton record.
pub mod store;

pub use error::StorageError;
pub use record::{MaintenanceRecord, MaintenanceStatus, naive_to_utc};
pub use state_machine::{Gate, MaintenanceStateMachine};
pub use store::{InMemoryMaintenanceStore, MaintenanceStore, PgMaintenanceStore};
