// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Maintenance record and status types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Stored (and derived) maintenance status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceStatus {
    /// No maintenance; user interactions are accepted.
    Inactive,
    /// A window is announced but has not started yet.
    Scheduled,
    /// The window is open; user interactions are rejected.
    Active,
}

impl MaintenanceStatus {
    /// Column representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceStatus::Inactive => "inactive",
            MaintenanceStatus::Scheduled => "scheduled",
            MaintenanceStatus::Active => "active",
        }
    }
}

impl fmt::Display for MaintenanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaintenanceStatus {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inactive" => Ok(MaintenanceStatus::Inactive),
            "scheduled" => Ok(MaintenanceStatus::Scheduled),
            "active" => Ok(MaintenanceStatus::Active),
            other => Err(StorageError::InvalidStatus(other.to_string())),
        }
    }
}

/// The singleton maintenance record.
///
/// Timestamps are always UTC. Stores are responsible for coercing naive
/// values with [`naive_to_utc`] before building a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceRecord {
    /// Stored status (may lag behind the effective one until derived).
    pub status: MaintenanceStatus,
    /// Operator-facing message shown to blocked users.
    pub message: Option<String>,
    /// Window start.
    pub start: Option<DateTime<Utc>>,
    /// Window end.
    pub end: Option<DateTime<Utc>>,
}

impl MaintenanceRecord {
    /// A cleared record: inactive, no message, no window.
    pub fn inactive() -> Self {
        Self {
            status: MaintenanceStatus::Inactive,
            message: None,
            start: None,
            end: None,
        }
    }

    /// Compute the status this record should have at `now`.
    ///
    /// An elapsed `end` wins over everything else, then `start` decides
    /// between active and scheduled. A record without a start is inactive.
    pub fn effective_status(&self, now: DateTime<Utc>) -> MaintenanceStatus {
        if let Some(end) = self.end
            && now >= end
        {
            return MaintenanceStatus::Inactive;
        }

        match self.start {
            Some(start) if now >= start => MaintenanceStatus::Active,
            Some(_) => MaintenanceStatus::Scheduled,
            None => MaintenanceStatus::Inactive,
        }
    }
}

impl Default for MaintenanceRecord {
    fn default() -> Self {
        Self::inactive()
    }
}

/// Interpret a naive timestamp as UTC. Never as local time.
pub fn naive_to_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&naive)
}
