// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Sentinel Watchdog - Supervisor and Self-Updater for the UEX Bot
//!
//! Keeps a single bot container alive and deploys new commits from its
//! upstream branch, announcing each deployment through a maintenance window
//! the bot itself honours.
//!
//! # Architecture
//!
//! ```text
//!                       ┌────────────────────────────┐
//!                       │      HealthSupervisor      │  tick every 60s
//!                       │  health check + daily diff │
//!                       └────────────────────────────┘
//!                          │ drift              │ restart
//!                          ▼                    ▼
//!  ┌────────────────────────────┐      ┌─────────────────────┐
//!  │     UpdateOrchestrator     │─────►│ ContainerController │ docker CLI
//!  │ notice, stop, pull, start, │      └─────────────────────┘
//!  │ verify, commit / roll back │      ┌─────────────────────┐
//!  │                            │─────►│      WorkTree       │ git CLI
//!  └────────────────────────────┘      └─────────────────────┘
//!      │               │               ┌─────────────────────┐
//!      │               └──────────────►│    CommitSource     │ GitHub API
//!      ▼                               │   CheckpointFile    │
//!  ┌────────────────────────────┐      └─────────────────────┘
//!  │  MaintenanceStateMachine   │      ┌─────────────────────┐
//!  │   (sentinel-maintenance)   │      │      Notifier       │ webhook
//!  └────────────────────────────┘      └─────────────────────┘
//!      │
//!      ▼
//!  PostgreSQL `bot_status` (read by the bot's interaction gate)
//! ```
//!
//! # Update outcomes
//!
//! | Outcome | Container | Working tree | Checkpoint |
//! |---------|-----------|--------------|------------|
//! | `Success` | running new code | target | target |
//! | `AbortedBeforeStop` | untouched | previous | unchanged |
//! | `FailedPull` | restarted | previous | unchanged |
//! | `FailedStart` | started again | reset to previous | unchanged |
//! | `FailedHealth` | restarted | reset to previous | unchanged |
//! | `RollbackFailed` | start attempted, may be stopped | unknown | unchanged |
//!
//! Every outcome clears maintenance and sends one alert. `Cancelled` (process
//! shutdown during a wait) clears maintenance without alerting.
//!
//! # Configuration
//!
//! See [`config::Config::from_env`]. The daily update check time is UTC.

#![deny(missing_docs)]

pub mod commit_source;
pub mod config;
pub mod container;
pub mod error;
pub mod notifier;
pub mod orchestrator;
pub mod runtime;
pub mod supervisor;
pub mod worktree;

pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use orchestrator::{UpdateConfig, UpdateOrchestrator, UpdateOutcome};
pub use runtime::WatchdogRuntime;
pub use supervisor::{HealthSupervisor, SupervisorConfig};
