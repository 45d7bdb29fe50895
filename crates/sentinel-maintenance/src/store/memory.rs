// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory maintenance store.
//!
//! Used by tests and by embedders that do not share the record with another
//! process. Counts writes and can be switched into a failing mode.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::MaintenanceStore;
use crate::error::{Result, StorageError};
use crate::record::MaintenanceRecord;

/// [`MaintenanceStore`] holding the record in process memory.
#[derive(Debug, Default)]
pub struct InMemoryMaintenanceStore {
    record: Mutex<Option<MaintenanceRecord>>,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl InMemoryMaintenanceStore {
    /// Create an empty store (no row).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `record`. Does not count as a write.
    pub fn with_record(record: MaintenanceRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
            ..Self::default()
        }
    }

    /// Current contents, bypassing failure injection.
    pub async fn snapshot(&self) -> Option<MaintenanceRecord> {
        self.record.lock().await.clone()
    }

    /// Number of successful `save` calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make subsequent `load` calls fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `save` calls fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MaintenanceStore for InMemoryMaintenanceStore {
    async fn load(&self) -> Result<Option<MaintenanceRecord>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("injected read failure".to_string()));
        }
        Ok(self.record.lock().await.clone())
    }

    async fn save(&self, record: &MaintenanceRecord) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("injected write failure".to_string()));
        }
        *self.record.lock().await = Some(record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
