// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Discord-compatible webhook notifier.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error};

use super::{Alert, Notifier};

/// HTTP request timeout for a single delivery.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const USERNAME: &str = "UEX Bot Watchdog";

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    username: &'a str,
    embeds: [Embed<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Embed<'a> {
    title: &'a str,
    description: &'a str,
    color: u32,
    timestamp: String,
    fields: Vec<EmbedField<'a>>,
    footer: EmbedFooter<'a>,
}

#[derive(Debug, Serialize)]
struct EmbedField<'a> {
    name: &'a str,
    value: &'a str,
    inline: bool,
}

#[derive(Debug, Serialize)]
struct EmbedFooter<'a> {
    text: &'a str,
}

impl<'a> From<&'a Alert> for WebhookPayload<'a> {
    fn from(alert: &'a Alert) -> Self {
        WebhookPayload {
            username: USERNAME,
            embeds: [Embed {
                title: &alert.title,
                description: &alert.description,
                color: alert.severity.color(),
                timestamp: alert.timestamp.to_rfc3339(),
                fields: alert
                    .fields
                    .iter()
                    .map(|f| EmbedField {
                        name: &f.name,
                        value: &f.value,
                        inline: f.inline,
                    })
                    .collect(),
                footer: EmbedFooter {
                    text: alert.severity.as_str(),
                },
            }],
        }
    }
}

/// Posts alerts as embeds to a webhook URL.
///
/// Without a URL every alert is dropped after a debug log.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Option<String>,
}

impl WebhookNotifier {
    /// Notifier posting to `url`.
    pub fn new(url: Option<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, url })
    }

    /// Whether alerts go anywhere.
    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    async fn send(&self, url: &str, alert: &Alert) -> Result<(), String> {
        let response = self
            .client
            .post(url)
            .json(&WebhookPayload::from(alert))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("webhook returned HTTP {}: {body}", status.as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, alert: Alert) {
        let Some(url) = &self.url else {
            debug!(title = %alert.title, "No webhook configured, dropping alert");
            return;
        };

        match self.send(url, &alert).await {
            Ok(()) => debug!(title = %alert.title, severity = %alert.severity, "Alert delivered"),
            Err(e) => error!(title = %alert.title, error = %e, "Failed to deliver alert"),
        }
    }
}
