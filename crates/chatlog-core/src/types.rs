// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the adapter traits and the write pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Internal primary key of an application row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub i64);

/// Internal primary key of a chat row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

/// Internal primary key of a message row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub i64);

/// Opaque handle of an asynchronous write task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A tenant. The token is the client-facing key and never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub name: String,
    pub token: String,
    pub chats_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// A chat owned by one application, numbered within it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub application_id: ApplicationId,
    pub number: i64,
    pub subject: String,
    pub messages_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// A message owned by one chat, numbered within it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub number: i64,
    pub body: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Resource kinds that each own a write queue and a worker.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Chats,
    Messages,
}

/// The mutation an asynchronous task performs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    CreateChat,
    UpdateChat,
    CreateMessage,
    UpdateMessage,
}

impl TaskKind {
    /// The queue this kind of task is routed to.
    pub fn resource(self) -> ResourceKind {
        match self {
            TaskKind::CreateChat | TaskKind::UpdateChat => ResourceKind::Chats,
            TaskKind::CreateMessage | TaskKind::UpdateMessage => ResourceKind::Messages,
        }
    }
}

/// Client-visible payload of a finished task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskOutput {
    Chat { number: i64, subject: String },
    Message { number: i64, body: String },
}

impl From<&Chat> for TaskOutput {
    fn from(chat: &Chat) -> Self {
        TaskOutput::Chat {
            number: chat.number,
            subject: chat.subject.clone(),
        }
    }
}

impl From<&Message> for TaskOutput {
    fn from(message: &Message) -> Self {
        TaskOutput::Message {
            number: message.number,
            body: message.body.clone(),
        }
    }
}

/// A message as mirrored into the secondary search store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub number: i64,
    pub body: String,
}

impl SearchDocument {
    /// Document key in the search store: `{chatId}-{messageId}`.
    pub fn document_id(&self) -> String {
        format!("{}-{}", self.chat_id.0, self.message_id.0)
    }
}

impl From<&Message> for SearchDocument {
    fn from(message: &Message) -> Self {
        Self {
            chat_id: message.chat_id,
            message_id: message.id,
            number: message.number,
            body: message.body.clone(),
        }
    }
}

/// A single search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub number: i64,
    pub body: String,
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Search,
}
