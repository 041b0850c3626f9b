// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed search store with an external-content FTS5 index.
//!
//! Documents live in `search_documents`; sync triggers keep
//! `search_documents_fts` up to date, and queries rank by BM25.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio_rusqlite::Connection;
use tracing::debug;

use chatlog_config::model::SearchConfig;
use chatlog_core::types::{ChatId, SearchDocument, SearchHit};
use chatlog_core::{AdapterType, ChatlogError, HealthStatus, PluginAdapter, SearchAdapter};

use crate::migrations;
use crate::query::match_expression;

/// Helper to convert tokio_rusqlite errors into ChatlogError::Search.
fn search_err<E>(e: tokio_rusqlite::Error<E>) -> ChatlogError
where
    E: std::error::Error + Send + Sync + 'static,
{
    ChatlogError::Search {
        source: Box::new(e),
    }
}

/// Secondary full-text store for message bodies.
///
/// Holds its own connection to its own database file. It is never written in
/// the same transaction as the primary store.
pub struct SqliteSearch {
    path: String,
    conn: OnceCell<Connection>,
}

impl SqliteSearch {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            path: config.database_path.clone(),
            conn: OnceCell::new(),
        }
    }

    fn conn(&self) -> Result<&Connection, ChatlogError> {
        self.conn.get().ok_or_else(|| ChatlogError::Search {
            source: "search store not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteSearch {
    fn name(&self) -> &str {
        "sqlite-fts5"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Search
    }

    async fn health_check(&self) -> Result<HealthStatus, ChatlogError> {
        let Some(conn) = self.conn.get() else {
            return Ok(HealthStatus::Unhealthy("not initialized".into()));
        };
        let count = conn
            .call(|conn| {
                conn.query_row("SELECT COUNT(*) FROM search_documents", [], |row| {
                    row.get::<_, i64>(0)
                })
            })
            .await;
        Ok(match count {
            Ok(_) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Degraded(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), ChatlogError> {
        if let Some(conn) = self.conn.get() {
            conn.call(|conn| conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);"))
                .await
                .map_err(search_err)?;
            debug!("search store shutdown complete");
        }
        Ok(())
    }
}

#[async_trait]
impl SearchAdapter for SqliteSearch {
    async fn initialize(&self) -> Result<(), ChatlogError> {
        let conn = Connection::open(&self.path)
            .await
            .map_err(|e| ChatlogError::Search {
                source: Box::new(e),
            })?;
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            let _mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            Ok(())
        })
        .await
        .map_err(search_err)?;
        conn.call(|conn| migrations::run_migrations(conn))
            .await
            .map_err(search_err)?;

        self.conn.set(conn).map_err(|_| ChatlogError::Search {
            source: "search store already initialized".into(),
        })?;
        debug!(path = %self.path, "search store initialized");
        Ok(())
    }

    async fn index(&self, document: &SearchDocument) -> Result<(), ChatlogError> {
        let doc_id = document.document_id();
        let document = document.clone();
        self.conn()?
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO search_documents (doc_id, chat_id, message_id, number, body)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(doc_id) DO UPDATE SET
                         number = excluded.number,
                         body = excluded.body,
                         indexed_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                    rusqlite::params![
                        doc_id,
                        document.chat_id.0,
                        document.message_id.0,
                        document.number,
                        document.body,
                    ],
                )
            })
            .await
            .map_err(search_err)?;
        Ok(())
    }

    async fn search(
        &self,
        chat_id: ChatId,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, ChatlogError> {
        let Some(expression) = match_expression(query) else {
            return Ok(Vec::new());
        };
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.conn()?
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT d.number, d.body
                     FROM search_documents_fts
                     JOIN search_documents d ON d.rowid = search_documents_fts.rowid
                     WHERE search_documents_fts MATCH ?1 AND d.chat_id = ?2
                     ORDER BY bm25(search_documents_fts), d.number
                     LIMIT ?3",
                )?;
                let hits = stmt
                    .query_map(rusqlite::params![expression, chat_id.0, limit], |row| {
                        Ok(SearchHit {
                            number: row.get(0)?,
                            body: row.get(1)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(hits)
            })
            .await
            .map_err(search_err::<rusqlite::Error>)
    }
}
