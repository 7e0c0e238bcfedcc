//! In-memory client store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::storage::{ClientRecord, ClientStore, StorageError};

/// Keeps records in a vector. Can be switched into a failing mode.
#[derive(Debug, Default)]
pub struct MemoryClientStore {
    records: Mutex<Vec<ClientRecord>>,
    failing: AtomicBool,
}

impl MemoryClientStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far, in order.
    pub fn records(&self) -> Vec<ClientRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// While set, every `record_client` call fails.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }
}

#[async_trait]
impl ClientStore for MemoryClientStore {
    async fn record_client(&self, record: &ClientRecord) -> Result<(), StorageError> {
        if self.failing.load(Ordering::Acquire) {
            return Err(StorageError::Unavailable("store is failing".into()));
        }
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}
