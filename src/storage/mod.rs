//! Persistence of provisioned clients.
//!
//! The gateway and the management API record every client they provision.
//! Records are append-only; nothing is read back at startup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::security::BucketConfig;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryClientStore;
pub use sqlite::SqliteClientStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A client identity together with its bucket parameters.
///
/// Also the body accepted by `POST /api/v1/client`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub ip: String,
    pub capacity: u32,
    pub rate_per_interval: u32,
    pub tokens: u32,
}

impl ClientRecord {
    pub fn new(ip: impl Into<String>, bucket: BucketConfig) -> Self {
        Self {
            ip: ip.into(),
            capacity: bucket.capacity,
            rate_per_interval: bucket.refill_rate,
            tokens: bucket.tokens,
        }
    }

    pub fn bucket(&self) -> BucketConfig {
        BucketConfig {
            capacity: self.capacity,
            refill_rate: self.rate_per_interval,
            tokens: self.tokens,
        }
    }
}

#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Persist one client record.
    async fn record_client(&self, record: &ClientRecord) -> Result<(), StorageError>;
}
