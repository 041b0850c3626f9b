// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for the primary (authoritative) store.

use async_trait::async_trait;

use crate::error::ChatlogError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Application, ApplicationId, Chat, ChatId, Message, MessageId};

/// Adapter for the primary relational store.
///
/// `create_chat` and `create_message` allocate the per-scope sequence number
/// and insert the row in one transaction. Implementations must guarantee that
/// concurrent callers for the same scope never observe the same number and
/// never leave a gap.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), ChatlogError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), ChatlogError>;

    // --- Applications ---

    async fn create_application(&self, name: &str, token: &str)
    -> Result<Application, ChatlogError>;

    async fn list_applications(&self) -> Result<Vec<Application>, ChatlogError>;

    async fn get_application(&self, token: &str) -> Result<Option<Application>, ChatlogError>;

    /// Renames an application. Returns `None` when the token is unknown.
    async fn update_application_name(
        &self,
        token: &str,
        name: &str,
    ) -> Result<Option<Application>, ChatlogError>;

    // --- Scope resolution ---

    async fn application_id_by_token(
        &self,
        token: &str,
    ) -> Result<Option<ApplicationId>, ChatlogError>;

    async fn chat_id_by_number(
        &self,
        application_id: ApplicationId,
        number: i64,
    ) -> Result<Option<ChatId>, ChatlogError>;

    async fn message_id_by_number(
        &self,
        chat_id: ChatId,
        number: i64,
    ) -> Result<Option<MessageId>, ChatlogError>;

    // --- Chats ---

    /// Allocates the next chat number for the application and inserts the chat.
    async fn create_chat(
        &self,
        application_id: ApplicationId,
        subject: &str,
    ) -> Result<Chat, ChatlogError>;

    async fn update_chat_subject(&self, chat_id: ChatId, subject: &str)
    -> Result<Chat, ChatlogError>;

    async fn list_chats(&self, application_id: ApplicationId) -> Result<Vec<Chat>, ChatlogError>;

    async fn get_chat(
        &self,
        application_id: ApplicationId,
        number: i64,
    ) -> Result<Option<Chat>, ChatlogError>;

    // --- Messages ---

    /// Allocates the next message number for the chat and inserts the message.
    async fn create_message(&self, chat_id: ChatId, body: &str) -> Result<Message, ChatlogError>;

    async fn update_message_body(
        &self,
        message_id: MessageId,
        body: &str,
    ) -> Result<Message, ChatlogError>;

    async fn list_messages(&self, chat_id: ChatId) -> Result<Vec<Message>, ChatlogError>;

    async fn get_message(
        &self,
        chat_id: ChatId,
        number: i64,
    ) -> Result<Option<Message>, ChatlogError>;
}
