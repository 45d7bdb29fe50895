// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for sentinel-watchdog.
//!
//! The daily update check time is interpreted as **UTC**.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveTime;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::commit_source::GitHubConfig;
use crate::orchestrator::UpdateConfig;
use crate::supervisor::SupervisorConfig;

/// Watchdog configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL URL of the database holding `bot_status`
    pub database_url: String,
    /// Maximum pool connections
    pub db_max_connections: u32,
    /// Source control settings
    pub github: GitHubConfig,
    /// Name of the managed container
    pub container_name: String,
    /// Working tree the container's code is mounted from
    pub repo_path: PathBuf,
    /// File holding the last deployed commit
    pub checkpoint_path: PathBuf,
    /// Supervisor tick interval
    pub health_check_interval: Duration,
    /// Daily drift check time (UTC)
    pub update_check_time: NaiveTime,
    /// Advance notice before the container is stopped
    pub maintenance_notice: Duration,
    /// Consecutive failures that raise alerts to the critical tier
    pub escalation_threshold: u32,
    /// Alert webhook; alerts are dropped when unset
    pub webhook_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = match var("DATABASE_URL") {
            Some(url) => url,
            None => {
                let host = var("DB_HOST").unwrap_or_else(|| "postgres".to_string());
                let port: u16 = parse_or(&var, "DB_PORT", 5432)?;
                let name = var("DB_NAME").unwrap_or_else(|| "uexbot".to_string());
                let user = var("DB_USER").unwrap_or_else(|| "uexuser".to_string());
                let password = var("DB_PASSWORD").unwrap_or_default();
                format!("postgres://{user}:{password}@{host}:{port}/{name}")
            }
        };

        let db_max_connections = parse_or(&var, "DB_MAX_CONNECTIONS", 10)?;

        let repo = var("GITHUB_REPO").ok_or(ConfigError::MissingEnvVar("GITHUB_REPO"))?;
        if !repo.contains('/') {
            return Err(ConfigError::InvalidValue {
                var: "GITHUB_REPO",
                value: repo,
            });
        }
        let github = GitHubConfig {
            api_url: var("GITHUB_API_URL")
                .unwrap_or_else(|| "https://api.github.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            repo,
            branch: var("GITHUB_BRANCH").unwrap_or_else(|| "main".to_string()),
            token: var("GITHUB_TOKEN"),
            timeout: Duration::from_secs(10),
        };

        let container_name = var("BOT_CONTAINER_NAME").unwrap_or_else(|| "python".to_string());

        let repo_path = PathBuf::from(var("GIT_REPO_PATH").unwrap_or_else(|| "/repo".to_string()));
        let checkpoint_path = var("COMMIT_SHA_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| repo_path.join("bot").join(".git_commit_sha"));

        let health_check_interval =
            Duration::from_secs(parse_or(&var, "HEALTH_CHECK_INTERVAL", 60u64)?);
        if health_check_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                var: "HEALTH_CHECK_INTERVAL",
                value: "0".to_string(),
            });
        }

        let raw_time = var("UPDATE_CHECK_TIME").unwrap_or_else(|| "03:00".to_string());
        let update_check_time = NaiveTime::parse_from_str(raw_time.trim(), "%H:%M").map_err(|_| {
            ConfigError::InvalidValue {
                var: "UPDATE_CHECK_TIME",
                value: raw_time.clone(),
            }
        })?;

        let notice_minutes: u64 = parse_or(&var, "MAINTENANCE_NOTICE_MINUTES", 30)?;
        let maintenance_notice = notice_minutes
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| ConfigError::InvalidValue {
                var: "MAINTENANCE_NOTICE_MINUTES",
                value: notice_minutes.to_string(),
            })?;
        let escalation_threshold = parse_or(&var, "FAILURE_ESCALATION_THRESHOLD", 3u32)?.max(1);

        Ok(Self {
            database_url,
            db_max_connections,
            github,
            container_name,
            repo_path,
            checkpoint_path,
            health_check_interval,
            update_check_time,
            maintenance_notice,
            escalation_threshold,
            webhook_url: var("WEBHOOK_MONITORING_URL"),
        })
    }

    /// Database pool that connects on first use.
    ///
    /// An unreachable database does not keep the watchdog from starting;
    /// container supervision works without it and maintenance writes fail
    /// per call until the database comes back.
    pub fn lazy_pool(&self) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(self.db_max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_lazy(&self.database_url)
    }

    /// Orchestrator settings derived from this configuration.
    pub fn update_config(&self) -> UpdateConfig {
        UpdateConfig {
            branch: self.github.branch.clone(),
            notice: self.maintenance_notice,
            ..UpdateConfig::default()
        }
    }

    /// Supervisor settings derived from this configuration.
    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            tick_interval: self.health_check_interval,
            escalation_threshold: self.escalation_threshold,
            update_check_time: self.update_check_time,
            ..SupervisorConfig::default()
        }
    }
}

fn parse_or<T, F>(var: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            var: key,
            value: raw,
        }),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    /// A variable is set but cannot be parsed.
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("GITHUB_REPO", "Passluk00/UEX-Market-Manager")]).unwrap();
        assert_eq!(config.database_url, "postgres://uexuser:@postgres:5432/uexbot");
        assert_eq!(config.github.branch, "main");
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert!(config.github.token.is_none());
        assert_eq!(config.container_name, "python");
        assert_eq!(config.repo_path, PathBuf::from("/repo"));
        assert_eq!(
            config.checkpoint_path,
            PathBuf::from("/repo/bot/.git_commit_sha")
        );
        assert_eq!(config.health_check_interval, Duration::from_secs(60));
        assert_eq!(
            config.update_check_time,
            NaiveTime::from_hms_opt(3, 0, 0).unwrap()
        );
        assert_eq!(config.maintenance_notice, Duration::from_secs(30 * 60));
        assert_eq!(config.escalation_threshold, 3);
        assert!(config.webhook_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("GITHUB_REPO", "acme/bot"),
            ("GITHUB_BRANCH", "release"),
            ("GITHUB_TOKEN", "ghp_secret"),
            ("GITHUB_API_URL", "http://localhost:9000/"),
            ("DATABASE_URL", "postgres://u:p@db/x"),
            ("BOT_CONTAINER_NAME", "uex-bot"),
            ("GIT_REPO_PATH", "/srv/repo"),
            ("HEALTH_CHECK_INTERVAL", "15"),
            ("UPDATE_CHECK_TIME", "22:45"),
            ("MAINTENANCE_NOTICE_MINUTES", "1"),
            ("FAILURE_ESCALATION_THRESHOLD", "5"),
            ("WEBHOOK_MONITORING_URL", "https://discord.test/hook"),
        ])
        .unwrap();

        assert_eq!(config.database_url, "postgres://u:p@db/x");
        assert_eq!(config.github.api_url, "http://localhost:9000");
        assert_eq!(config.github.token.as_deref(), Some("ghp_secret"));
        assert_eq!(
            config.checkpoint_path,
            PathBuf::from("/srv/repo/bot/.git_commit_sha")
        );
        assert_eq!(
            config.update_check_time,
            NaiveTime::from_hms_opt(22, 45, 0).unwrap()
        );

        let update = config.update_config();
        assert_eq!(update.branch, "release");
        assert_eq!(update.notice, Duration::from_secs(60));

        let supervisor = config.supervisor_config();
        assert_eq!(supervisor.tick_interval, Duration::from_secs(15));
        assert_eq!(supervisor.escalation_threshold, 5);
    }

    #[test]
    fn test_missing_repo() {
        assert!(matches!(
            load(&[]),
            Err(ConfigError::MissingEnvVar("GITHUB_REPO"))
        ));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            load(&[("GITHUB_REPO", "acme/bot"), ("UPDATE_CHECK_TIME", "3am")]),
            Err(ConfigError::InvalidValue { var: "UPDATE_CHECK_TIME", .. })
        ));
        assert!(matches!(
            load(&[("GITHUB_REPO", "acme/bot"), ("HEALTH_CHECK_INTERVAL", "soon")]),
            Err(ConfigError::InvalidValue { var: "HEALTH_CHECK_INTERVAL", .. })
        ));
        assert!(matches!(
            load(&[("GITHUB_REPO", "no-slash")]),
            Err(ConfigError::InvalidValue { var: "GITHUB_REPO", .. })
        ));
    }

    #[test]
    fn test_notice_overflow_is_rejected() {
        let max = u64::MAX.to_string();
        assert!(matches!(
            load(&[("GITHUB_REPO", "acme/bot"), ("MAINTENANCE_NOTICE_MINUTES", max.as_str())]),
            Err(ConfigError::InvalidValue { var: "MAINTENANCE_NOTICE_MINUTES", .. })
        ));
    }

    #[tokio::test]
    async fn test_lazy_pool_does_not_need_a_database() {
        let config = load(&[
            ("GITHUB_REPO", "acme/bot"),
            ("DATABASE_URL", "postgres://u:p@127.0.0.1:1/db"),
        ])
        .unwrap();
        let pool = config.lazy_pool().unwrap();
        assert_eq!(pool.size(), 0);
    }

    #[test]
    fn test_empty_values_fall_back_to_defaults() {
        let config = load(&[
            ("GITHUB_REPO", "acme/bot"),
            ("GITHUB_TOKEN", ""),
            ("WEBHOOK_MONITORING_URL", "  "),
        ])
        .unwrap();
        assert!(config.github.token.is_none());
        assert!(config.webhook_url.is_none());
    }
}
