// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! GitHub REST API commit source.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::debug;

use super::{CommitInfo, CommitSource, CommitSourceError};

/// Settings for [`GitHubCommitSource`].
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// API base URL without trailing slash
    pub api_url: String,
    /// Repository in `owner/name` form
    pub repo: String,
    /// Tracked branch
    pub branch: String,
    /// Optional token; raises the rate limit and unlocks private repos
    pub token: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    #[serde(default)]
    message: String,
    author: Option<CommitAuthor>,
}

#[derive(Debug, Deserialize)]
struct CommitAuthor {
    #[serde(default)]
    name: String,
    date: Option<DateTime<Utc>>,
}

impl From<CommitResponse> for CommitInfo {
    fn from(response: CommitResponse) -> Self {
        let (author, date) = match response.commit.author {
            Some(a) => (a.name, a.date),
            None => (String::new(), None),
        };
        CommitInfo {
            sha: response.sha,
            message: response.commit.message,
            author,
            date,
        }
    }
}

/// Reads commits through `GET /repos/{repo}/commits/{ref}`.
pub struct GitHubCommitSource {
    client: reqwest::Client,
    config: GitHubConfig,
}

impl GitHubCommitSource {
    /// Build a client for `config`.
    pub fn new(config: GitHubConfig) -> Result<Self, CommitSourceError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("sentinel-watchdog/", env!("CARGO_PKG_VERSION"))),
        );
        if let Some(token) = &config.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| CommitSourceError::Malformed("token is not a valid header".into()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self { client, config })
    }

    async fn fetch(&self, reference: &str) -> Result<CommitResponse, CommitSourceError> {
        let url = format!(
            "{}/repos/{}/commits/{}",
            self.config.api_url, self.config.repo, reference
        );
        debug!(url = %url, "Fetching commit");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CommitSourceError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        let parsed: CommitResponse = serde_json::from_str(&body)
            .map_err(|e| CommitSourceError::Malformed(e.to_string()))?;
        if parsed.sha.trim().is_empty() {
            return Err(CommitSourceError::Malformed("empty sha".to_string()));
        }
        Ok(parsed)
    }
}

#[async_trait]
impl CommitSource for GitHubCommitSource {
    async fn latest_commit(&self) -> Result<String, CommitSourceError> {
        Ok(self.fetch(&self.config.branch).await?.sha)
    }

    async fn commit_info(&self, sha: &str) -> Result<CommitInfo, CommitSourceError> {
        Ok(self.fetch(sha).await?.into())
    }
}
