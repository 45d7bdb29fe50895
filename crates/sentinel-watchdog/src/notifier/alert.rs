// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Alert model and the catalogue of alerts the watchdog sends.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::commit_source::{short_sha, short_sha_or_unknown};

/// Longest alert body (Discord rejects more than 4096).
const MAX_DESCRIPTION_CHARS: usize = 4000;
/// Longest single field value (Discord rejects more than 1024).
const MAX_FIELD_CHARS: usize = 1000;

/// Alert severity. Decides the embed colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Routine event.
    Info,
    /// Something completed successfully.
    Success,
    /// Degraded but self-healing.
    Warning,
    /// An operation failed.
    Error,
    /// Escalated; needs a human.
    Critical,
}

impl Severity {
    /// Embed colour as a 24-bit RGB integer.
    pub fn color(&self) -> u32 {
        match self {
            Severity::Info => 0x0099FF,
            Severity::Success => 0x00FF00,
            Severity::Warning => 0xFFAA00,
            Severity::Error => 0xFF0000,
            Severity::Critical => 0x8B0000,
        }
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A name/value pair shown under the alert description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertField {
    /// Field label
    pub name: String,
    /// Field content
    pub value: String,
    /// Render side by side with neighbouring inline fields
    pub inline: bool,
}

/// An operator alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// Short headline
    pub title: String,
    /// Body text
    pub description: String,
    /// Severity
    pub severity: Severity,
    /// When the alert was raised
    pub timestamp: DateTime<Utc>,
    /// Extra fields
    pub fields: Vec<AlertField>,
}

impl Alert {
    /// A new alert stamped with the current time.
    pub fn new(
        severity: Severity,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity,
            timestamp: Utc::now(),
            fields: Vec::new(),
        }
    }

    /// Append a field.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(AlertField {
            name: name.into(),
            value: truncate(&value.into(), MAX_FIELD_CHARS),
            inline,
        });
        self
    }

    /// Value of the first field named `name`.
    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    /// A deployment was announced.
    pub fn update_scheduled(
        current: Option<&str>,
        target: &str,
        notice: Duration,
        headline: Option<&str>,
    ) -> Self {
        let minutes = notice.as_secs() / 60;
        let mut alert = Self::new(
            Severity::Warning,
            "Maintenance Scheduled",
            format!(
                "The bot will be restarted in {minutes} minutes to deploy a new version. \
                 Commands are disabled during the update."
            ),
        )
        .field("Current Version", short_sha_or_unknown(current), true)
        .field("New Version", short_sha(target), true);
        if let Some(headline) = headline.filter(|h| !h.is_empty()) {
            alert = alert.field("Changes", headline, false);
        }
        alert
    }

    /// A deployment completed and the container is healthy.
    pub fn update_succeeded(previous: Option<&str>, deployed: &str) -> Self {
        Self::new(
            Severity::Success,
            "Update Successful",
            "The bot was updated and passed its health checks.",
        )
        .field("Previous Version", short_sha_or_unknown(previous), true)
        .field("Current Version", short_sha(deployed), true)
    }

    /// A deployment failed and the previous version is running again.
    pub fn update_failed(error: &str, rolled_back_to: Option<&str>, logs: Option<&str>) -> Self {
        Self::new(
            Severity::Error,
            "Update Failed - Rollback Executed",
            with_logs("The update could not be completed and was rolled back.", logs),
        )
        .field("Error", error, false)
        .field("Rolled Back To", short_sha_or_unknown(rolled_back_to), true)
    }

    /// A deployment was called off before the container was stopped.
    pub fn update_aborted(error: &str, running: Option<&str>) -> Self {
        Self::new(
            Severity::Warning,
            "Update Aborted",
            "The update was called off before the bot was stopped. Nothing was changed.",
        )
        .field("Error", error, false)
        .field("Running Version", short_sha_or_unknown(running), true)
    }

    /// A deployment failed and the service could not be restored.
    pub fn rollback_failed(error: &str, intended: Option<&str>, logs: Option<&str>) -> Self {
        Self::new(
            Severity::Critical,
            "Update Failed - Rollback Failed",
            with_logs(
                "The update failed and the previous version could not be restored \
                 or the bot could not be started again.",
                logs,
            ),
        )
        .field("Error", error, false)
        .field("Intended Rollback Target", short_sha_or_unknown(intended), true)
        .field("Action Required", "Manual intervention needed", false)
    }

    /// The container failed a health check.
    pub fn container_unhealthy(
        container: &str,
        status: &str,
        consecutive_failures: u32,
        severity: Severity,
    ) -> Self {
        Self::new(
            severity,
            "Container Unhealthy",
            format!("Container `{container}` failed its health check. Attempting a restart."),
        )
        .field("Status", status, true)
        .field("Consecutive Failures", consecutive_failures.to_string(), true)
    }

    /// The container was restarted and is healthy again.
    pub fn container_restarted(container: &str, reason: &str) -> Self {
        Self::new(
            Severity::Info,
            "Container Restarted",
            format!("Container `{container}` was restarted."),
        )
        .field("Reason", reason, false)
        .field("Status", "Running", true)
    }

    /// The restart itself failed.
    pub fn container_restart_failed(container: &str, error: &str) -> Self {
        Self::new(
            Severity::Error,
            "Container Restart Failed",
            format!("Container `{container}` could not be restarted."),
        )
        .field("Error", error, false)
    }

    /// The deployed commit matches the branch head.
    pub fn up_to_date(sha: &str) -> Self {
        Self::new(
            Severity::Info,
            "No Update Needed",
            "The bot is running the latest version.",
        )
        .field("Current Version", short_sha(sha), true)
    }

    /// The daily drift check could not reach the commit source.
    pub fn update_check_failed(error: &str) -> Self {
        Self::new(
            Severity::Warning,
            "Update Check Failed",
            "Could not determine the latest version. Will retry tomorrow.",
        )
        .field("Error", error, false)
    }

    /// The supervisor loop began.
    pub fn supervisor_started(container: &str, tick: Duration, update_check: &str) -> Self {
        Self::new(
            Severity::Info,
            "Watchdog Started",
            format!("Now supervising container `{container}`."),
        )
        .field("Health Check Interval", format!("{}s", tick.as_secs()), true)
        .field("Daily Update Check", format!("{update_check} UTC"), true)
    }

    /// The supervisor loop ended.
    pub fn supervisor_stopped(container: &str) -> Self {
        Self::new(
            Severity::Warning,
            "Watchdog Stopped",
            format!("Container `{container}` is no longer supervised."),
        )
    }

    /// A supervisor tick failed.
    pub fn tick_failed(error: &str) -> Self {
        Self::new(
            Severity::Error,
            "Watchdog Error",
            "A supervision cycle failed. Retrying on the next cycle.",
        )
        .field("Error", error, false)
    }
}

fn with_logs(summary: &str, logs: Option<&str>) -> String {
    match logs {
        Some(logs) => truncate(
            &format!("{summary}\n\nRecent logs:\n```\n{logs}\n```"),
            MAX_DESCRIPTION_CHARS,
        ),
        None => summary.to_string(),
    }
}

/// Keep at most `max` characters of `s`, marking the cut.
pub(crate) fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((idx, _)) => format!("{}…", &s[..idx]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_colors() {
        assert_eq!(Severity::Info.color(), 0x0099FF);
        assert_eq!(Severity::Warning.color(), 0xFFAA00);
        assert_eq!(Severity::Error.color(), 0xFF0000);
        assert_eq!(Severity::Success.color(), 0x00FF00);
        assert_eq!(Severity::Critical.color(), 0x8B0000);
    }

    #[test]
    fn test_update_scheduled() {
        let alert = Alert::update_scheduled(
            Some("aaa111aaa111"),
            "bbb222bbb222",
            Duration::from_secs(30 * 60),
            Some("Add market alerts"),
        );
        assert_eq!(alert.severity, Severity::Warning);
        assert!(alert.description.contains("30 minutes"));
        assert_eq!(alert.field_value("Current Version"), Some("aaa111aa"));
        assert_eq!(alert.field_value("New Version"), Some("bbb222bb"));
        assert_eq!(alert.field_value("Changes"), Some("Add market alerts"));
    }

    #[test]
    fn test_unknown_previous() {
        let alert = Alert::update_succeeded(None, "bbb222");
        assert_eq!(alert.field_value("Previous Version"), Some("unknown"));
        assert_eq!(alert.field_value("Current Version"), Some("bbb222"));
    }

    #[test]
    fn test_update_failed_carries_logs() {
        let alert = Alert::update_failed(
            "Container failed health check after update",
            Some("aaa111"),
            Some("ImportError: discord"),
        );
        assert_eq!(alert.severity, Severity::Error);
        assert!(alert.description.contains("ImportError: discord"));
        assert_eq!(
            alert.field_value("Error"),
            Some("Container failed health check after update")
        );
        assert_eq!(alert.field_value("Rolled Back To"), Some("aaa111"));

        let alert = Alert::update_failed(&"e".repeat(1500), None, None);
        assert_eq!(alert.field_value("Error").unwrap().chars().count(), 1001);
        assert!(!alert.description.contains("Recent logs"));
    }

    #[test]
    fn test_update_aborted_claims_no_rollback() {
        let alert = Alert::update_aborted("Failed to stop container: timeout", Some("aaa111aaa111"));
        assert_eq!(alert.severity, Severity::Warning);
        assert_eq!(alert.title, "Update Aborted");
        assert!(!alert.description.contains("rolled back"));
        assert_eq!(alert.field_value("Running Version"), Some("aaa111aa"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc…");
        // multi-byte characters are never split
        assert_eq!(truncate("ééé", 2), "éé…");
    }

    #[test]
    fn test_long_fields_are_truncated() {
        let alert = Alert::update_check_failed(&"x".repeat(5000));
        assert_eq!(
            alert.field_value("Error").unwrap().chars().count(),
            MAX_FIELD_CHARS + 1
        );
    }
}
