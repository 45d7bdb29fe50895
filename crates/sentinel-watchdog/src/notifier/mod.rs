// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Operator alerts.
//!
//! Delivery is best effort: a [`Notifier`] never reports failure to its
//! caller, it logs and moves on.

mod alert;
pub mod recording;
mod webhook;

use async_trait::async_trait;

pub use alert::{Alert, AlertField, Severity};
pub use recording::RecordingNotifier;
pub use webhook::WebhookNotifier;

/// Sink for operator alerts.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `alert`. Never fails.
    async fn notify(&self, alert: Alert);
}
