// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Maintenance state machine.
//!
//! Turns the stored `(status, start, end)` tuple into the effective status and
//! writes the correction back when they disagree. This is how a scheduled
//! window turns active, and later inactive, without anybody driving it:
//! whoever reads the record next heals it.
//!
//! ```text
//!   ┌──────────┐  now >= start   ┌────────┐   now >= end   ┌──────────┐
//!   │SCHEDULED │ ───────────────►│ ACTIVE │ ──────────────►│ INACTIVE │
//!   └──────────┘                 └────────┘                └──────────┘
//!        ▲                                                       │
//!        └──────────────── set_maintenance(...) ─────────────────┘
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::Result;
use crate::record::{MaintenanceRecord, MaintenanceStatus};
use crate::store::MaintenanceStore;

/// Message shown to users when the record carries none.
pub const DEFAULT_BLOCK_MESSAGE: &str = "The bot is undergoing maintenance. Please try again later.";

/// Decision for a single user interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    /// The interaction may proceed.
    Open,
    /// The interaction must be rejected with `message`.
    Blocked {
        /// Text to show to the user.
        message: String,
    },
}

impl Gate {
    /// Whether the interaction must be rejected.
    pub fn is_blocked(&self) -> bool {
        matches!(self, Gate::Blocked { .. })
    }
}

/// Derives and mutates the maintenance record through a [`MaintenanceStore`].
///
/// Storage errors are returned as-is; nothing here retries.
#[derive(Clone)]
pub struct MaintenanceStateMachine {
    store: Arc<dyn MaintenanceStore>,
}

impl MaintenanceStateMachine {
    /// Create a state machine over `store`.
    pub fn new(store: Arc<dyn MaintenanceStore>) -> Self {
        Self { store }
    }

    /// Derive the effective status at the current UTC time.
    pub async fn derive_state(
        &self,
    ) -> Result<(MaintenanceStatus, Option<MaintenanceRecord>)> {
        self.derive_state_at(Utc::now()).await
    }

    /// Derive the effective status at `now`.
    ///
    /// Performs at most one write, and only when the stored status is stale.
    /// The returned record reflects what is stored after the call.
    pub async fn derive_state_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<(MaintenanceStatus, Option<MaintenanceRecord>)> {
        let Some(record) = self.store.load().await? else {
            return Ok((MaintenanceStatus::Inactive, None));
        };

        let effective = record.effective_status(now);
        if effective == record.status {
            return Ok((effective, Some(record)));
        }

        let previous = record.status;
        let healed = MaintenanceRecord {
            status: effective,
            ..record
        };
        self.store.save(&healed).await?;

        info!(
            from = %previous,
            to = %effective,
            start = ?healed.start,
            end = ?healed.end,
            "Maintenance status transitioned"
        );

        Ok((effective, Some(healed)))
    }

    /// Upsert the record. No ordering check on `start`/`end` happens here.
    pub async fn set_maintenance(
        &self,
        status: MaintenanceStatus,
        message: Option<String>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let record = MaintenanceRecord {
            status,
            message,
            start,
            end,
        };
        self.store.save(&record).await?;

        info!(
            status = %status,
            start = ?start,
            end = ?end,
            "Maintenance record updated"
        );
        Ok(())
    }

    /// Reset to inactive with no message and no window.
    pub async fn clear(&self) -> Result<()> {
        self.set_maintenance(MaintenanceStatus::Inactive, None, None, None)
            .await
    }

    /// Whether user interactions should currently be rejected.
    pub async fn is_in_maintenance(&self) -> Result<bool> {
        let (status, _) = self.derive_state().await?;
        Ok(status == MaintenanceStatus::Active)
    }

    /// Gate a user interaction against the current window.
    pub async fn interaction_gate(&self) -> Result<Gate> {
        self.interaction_gate_at(Utc::now()).await
    }

    /// Gate a user interaction against the window at `now`.
    pub async fn interaction_gate_at(&self, now: DateTime<Utc>) -> Result<Gate> {
        let (status, record) = self.derive_state_at(now).await?;
        if status != MaintenanceStatus::Active {
            return Ok(Gate::Open);
        }

        let message = record
            .and_then(|r| r.message)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BLOCK_MESSAGE.to_string());

        debug!("Interaction blocked by active maintenance");
        Ok(Gate::Blocked { message })
    }
}
