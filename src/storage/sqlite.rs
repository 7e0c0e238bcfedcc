//! SQLite-backed client store.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::config::DatabaseConfig;
use crate::storage::{ClientRecord, ClientStore, StorageError};

pub struct SqliteClientStore {
    pool: SqlitePool,
}

impl SqliteClientStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the configured database and create the schema if missing.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.migrate().await?;

        tracing::info!(url = %config.url, "Client store ready");
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS clients (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ip TEXT NOT NULL,
                capacity INTEGER NOT NULL,
                rate_per_interval INTEGER NOT NULL,
                tokens INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Number of stored rows.
    pub async fn count(&self) -> Result<i64, StorageError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM clients")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl ClientStore for SqliteClientStore {
    async fn record_client(&self, record: &ClientRecord) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO clients (ip, capacity, rate_per_interval, tokens) VALUES (?, ?, ?, ?)",
        )
        .bind(&record.ip)
        .bind(i64::from(record.capacity))
        .bind(i64::from(record.rate_per_interval))
        .bind(i64::from(record.tokens))
        .execute(&self.pool)
        .await?;

        tracing::debug!(client = %record.ip, "Client record stored");
        Ok(())
    }
}
