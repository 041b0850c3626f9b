// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use chatlog_config::model::StorageConfig;
use chatlog_core::types::{Application, ApplicationId, Chat, ChatId, Message, MessageId};
use chatlog_core::{AdapterType, ChatlogError, HealthStatus, PluginAdapter, StorageAdapter};

use crate::database::{Database, DatabaseOptions};
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is opened on the first call to
/// [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`initialize`] is called.
    ///
    /// [`initialize`]: StorageAdapter::initialize
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, ChatlogError> {
        self.db.get().ok_or_else(|| ChatlogError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ChatlogError> {
        let Some(db) = self.db.get() else {
            return Ok(HealthStatus::Unhealthy("not initialized".into()));
        };
        let probe = db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await;
        Ok(match probe {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), ChatlogError> {
        if let Some(db) = self.db.get() {
            db.close().await?;
            debug!("storage shutdown complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), ChatlogError> {
        let db = Database::open_with(&DatabaseOptions::from(&self.config)).await?;
        self.db.set(db).map_err(|_| ChatlogError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), ChatlogError> {
        self.db()?.close().await
    }

    // --- Applications ---

    async fn create_application(
        &self,
        name: &str,
        token: &str,
    ) -> Result<Application, ChatlogError> {
        queries::applications::create_application(self.db()?, name, token).await
    }

    async fn list_applications(&self) -> Result<Vec<Application>, ChatlogError> {
        queries::applications::list_applications(self.db()?).await
    }

    async fn get_application(&self, token: &str) -> Result<Option<Application>, ChatlogError> {
        queries::applications::get_application(self.db()?, token).await
    }

    async fn update_application_name(
        &self,
        token: &str,
        name: &str,
    ) -> Result<Option<Application>, ChatlogError> {
        queries::applications::update_application_name(self.db()?, token, name).await
    }

    // --- Scope resolution ---

    async fn application_id_by_token(
        &self,
        token: &str,
    ) -> Result<Option<ApplicationId>, ChatlogError> {
        queries::applications::application_id_by_token(self.db()?, token).await
    }

    async fn chat_id_by_number(
        &self,
        application_id: ApplicationId,
        number: i64,
    ) -> Result<Option<ChatId>, ChatlogError> {
        queries::chats::chat_id_by_number(self.db()?, application_id, number).await
    }

    async fn message_id_by_number(
        &self,
        chat_id: ChatId,
        number: i64,
    ) -> Result<Option<MessageId>, ChatlogError> {
        queries::messages::message_id_by_number(self.db()?, chat_id, number).await
    }

    // --- Chats ---

    async fn create_chat(
        &self,
        application_id: ApplicationId,
        subject: &str,
    ) -> Result<Chat, ChatlogError> {
        queries::chats::create_chat(self.db()?, application_id, subject).await
    }

    async fn update_chat_subject(
        &self,
        chat_id: ChatId,
        subject: &str,
    ) -> Result<Chat, ChatlogError> {
        queries::chats::update_chat_subject(self.db()?, chat_id, subject).await
    }

    async fn list_chats(&self, application_id: ApplicationId) -> Result<Vec<Chat>, ChatlogError> {
        queries::chats::list_chats(self.db()?, application_id).await
    }

    async fn get_chat(
        &self,
        application_id: ApplicationId,
        number: i64,
    ) -> Result<Option<Chat>, ChatlogError> {
        queries::chats::get_chat(self.db()?, application_id, number).await
    }

    // --- Messages ---

    async fn create_message(&self, chat_id: ChatId, body: &str) -> Result<Message, ChatlogError> {
        queries::messages::create_message(self.db()?, chat_id, body).await
    }

    async fn update_message_body(
        &self,
        message_id: MessageId,
        body: &str,
    ) -> Result<Message, ChatlogError> {
        queries::messages::update_message_body(self.db()?, message_id, body).await
    }

    async fn list_messages(&self, chat_id: ChatId) -> Result<Vec<Message>, ChatlogError> {
        queries::messages::list_messages(self.db()?, chat_id).await
    }

    async fn get_message(
        &self,
        chat_id: ChatId,
        number: i64,
    ) -> Result<Option<Message>, ChatlogError> {
        queries::messages::get_message(self.db()?, chat_id, number).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
            busy_timeout_ms: 5000,
        }
    }

    #[tokio::test]
    async fn sqlite_storage_implements_plugin_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.version(), semver::Version::new(0, 1, 0));
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn initialize_opens_database_at_configured_path() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("init_test.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(db_path.exists(), "database file should be created");
        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn double_initialize_fails() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(storage.initialize().await.is_err());
    }

    #[tokio::test]
    async fn operations_before_initialize_fail() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("uninit.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        let err = storage.list_applications().await.unwrap_err();
        assert!(err.to_string().contains("not initialized"));
        assert!(matches!(
            storage.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
    }

    #[tokio::test]
    async fn full_hierarchy_through_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("hierarchy.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();

        let app = storage.create_application("app", "tok").await.unwrap();
        let app_id = storage.application_id_by_token("tok").await.unwrap();
        assert_eq!(app_id, Some(app.id));

        let chat = storage.create_chat(app.id, "subject").await.unwrap();
        let msg = storage.create_message(chat.id, "body").await.unwrap();
        assert_eq!((chat.number, msg.number), (1, 1));

        let resolved = storage
            .message_id_by_number(chat.id, 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved, msg.id);

        storage.shutdown().await.unwrap();
    }
}
