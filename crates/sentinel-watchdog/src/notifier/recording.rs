// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Notifier that keeps alerts in memory, for tests.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{Alert, Notifier, Severity};

/// Records every alert it receives.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingNotifier {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All alerts so far, oldest first.
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Titles of all alerts so far.
    pub fn titles(&self) -> Vec<String> {
        self.alerts().into_iter().map(|a| a.title).collect()
    }

    /// Number of alerts so far.
    pub fn count(&self) -> usize {
        self.alerts.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Number of alerts with `severity`.
    pub fn count_severity(&self, severity: Severity) -> usize {
        self.alerts()
            .iter()
            .filter(|a| a.severity == severity)
            .count()
    }

    /// Most recent alert.
    pub fn last(&self) -> Option<Alert> {
        self.alerts().pop()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.alerts.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, alert: Alert) {
        self.alerts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(alert);
    }
}
