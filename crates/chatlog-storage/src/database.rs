// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! Calls on one [`Database`] are serialized through tokio-rusqlite's background
//! thread. Several handles (or processes) may open the same file; writers that
//! allocate sequence numbers coordinate through `BEGIN IMMEDIATE` and the
//! busy timeout.

use std::time::Duration;

use chatlog_config::model::StorageConfig;
use chatlog_core::ChatlogError;
use tracing::{debug, warn};

use crate::migrations;

/// Convert a tokio-rusqlite error into [`ChatlogError::Storage`].
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> ChatlogError {
    ChatlogError::Storage {
        source: Box::new(e),
    }
}

/// Connection settings for [`Database::open_with`].
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub path: String,
    pub wal_mode: bool,
    pub busy_timeout: Duration,
}

impl DatabaseOptions {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            wal_mode: true,
            busy_timeout: Duration::from_millis(5000),
        }
    }
}

impl From<&StorageConfig> for DatabaseOptions {
    fn from(config: &StorageConfig) -> Self {
        Self {
            path: config.database_path.clone(),
            wal_mode: config.wal_mode,
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
        }
    }
}

/// Handle to the primary SQLite database.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path` with default options and run migrations.
    pub async fn open(path: &str) -> Result<Self, ChatlogError> {
        Self::open_with(&DatabaseOptions::new(path)).await
    }

    /// Open the database, apply PRAGMAs, and run pending migrations.
    pub async fn open_with(options: &DatabaseOptions) -> Result<Self, ChatlogError> {
        let conn = tokio_rusqlite::Connection::open(&options.path)
            .await
            .map_err(|e| ChatlogError::Storage {
                source: Box::new(e),
            })?;

        let wal_mode = options.wal_mode;
        let busy_timeout = options.busy_timeout;
        let journal_mode = conn
            .call(move |conn| {
                conn.busy_timeout(busy_timeout)?;
                conn.pragma_update(None, "foreign_keys", "ON")?;
                conn.pragma_update(None, "synchronous", "NORMAL")?;
                let mode: String = if wal_mode {
                    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?
                } else {
                    conn.pragma_query_value(None, "journal_mode", |row| row.get(0))?
                };
                Ok(mode)
            })
            .await
            .map_err(map_tr_err)?;

        if wal_mode && !journal_mode.eq_ignore_ascii_case("wal") {
            warn!(path = %options.path, journal_mode = %journal_mode, "WAL mode not available");
        }

        conn.call(|conn| migrations::run_migrations(conn))
            .await
            .map_err(|e| ChatlogError::Storage {
                source: Box::new(e),
            })?;

        debug!(path = %options.path, journal_mode = %journal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint and truncate the WAL. The connection stays usable.
    pub async fn close(&self) -> Result<(), ChatlogError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}
