// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entry point for asynchronous writes.
//!
//! The dispatcher validates input, resolves client-facing tokens and numbers
//! to internal ids, and hands the resolved request to the coordinator. It
//! fails fast on any miss and never waits on persistence.

use std::sync::Arc;

use chatlog_core::{
    ApplicationId, ChatId, ChatlogError, MessageId, StorageAdapter, TaskId, TaskKind,
};
use tracing::debug;

use crate::coordinator::WriteCoordinator;
use crate::status::TaskSnapshot;
use crate::task::{TaskHandle, WriteRequest};

/// Reject blank required fields.
pub fn require(field: &str, value: &str) -> Result<(), ChatlogError> {
    if value.trim().is_empty() {
        return Err(ChatlogError::Validation(format!("{field} is required")));
    }
    Ok(())
}

pub struct Dispatcher {
    storage: Arc<dyn StorageAdapter>,
    coordinator: Arc<WriteCoordinator>,
}

impl Dispatcher {
    pub fn new(storage: Arc<dyn StorageAdapter>, coordinator: Arc<WriteCoordinator>) -> Self {
        Self {
            storage,
            coordinator,
        }
    }

    pub fn coordinator(&self) -> &Arc<WriteCoordinator> {
        &self.coordinator
    }

    pub async fn create_chat(&self, token: &str, subject: &str) -> Result<TaskHandle, ChatlogError> {
        require("subject", subject)?;
        let application_id = self.resolve_application(token).await?;
        self.submit(WriteRequest::CreateChat {
            application_id,
            subject: subject.to_string(),
        })
    }

    pub async fn update_chat(
        &self,
        token: &str,
        chat_number: i64,
        subject: &str,
    ) -> Result<TaskHandle, ChatlogError> {
        require("newSubject", subject)?;
        let chat_id = self.resolve_chat(token, chat_number).await?;
        self.submit(WriteRequest::UpdateChat {
            chat_id,
            subject: subject.to_string(),
        })
    }

    pub async fn create_message(
        &self,
        token: &str,
        chat_number: i64,
        body: &str,
    ) -> Result<TaskHandle, ChatlogError> {
        require("body", body)?;
        let chat_id = self.resolve_chat(token, chat_number).await?;
        self.submit(WriteRequest::CreateMessage {
            chat_id,
            body: body.to_string(),
        })
    }

    pub async fn update_message(
        &self,
        token: &str,
        chat_number: i64,
        message_number: i64,
        body: &str,
    ) -> Result<TaskHandle, ChatlogError> {
        require("newBody", body)?;
        let message_id = self
            .resolve_message(token, chat_number, message_number)
            .await?;
        self.submit(WriteRequest::UpdateMessage {
            message_id,
            body: body.to_string(),
        })
    }

    /// Current status of a task.
    pub fn status(&self, task_id: &TaskId) -> Result<TaskSnapshot, ChatlogError> {
        self.coordinator
            .status()
            .get(task_id)
            .ok_or_else(|| ChatlogError::not_found("task", task_id.to_string()))
    }

    fn submit(&self, request: WriteRequest) -> Result<TaskHandle, ChatlogError> {
        let kind: TaskKind = request.kind();
        let task_id = self.coordinator.enqueue(request)?;
        Ok(TaskHandle { task_id, kind })
    }

    pub async fn resolve_application(&self, token: &str) -> Result<ApplicationId, ChatlogError> {
        self.storage
            .application_id_by_token(token)
            .await?
            .ok_or_else(|| ChatlogError::not_found("application", token))
    }

    pub async fn resolve_chat(&self, token: &str, chat_number: i64) -> Result<ChatId, ChatlogError> {
        let application_id = self.resolve_application(token).await?;
        let chat_id = self
            .storage
            .chat_id_by_number(application_id, chat_number)
            .await?
            .ok_or_else(|| ChatlogError::not_found("chat", format!("{token}/{chat_number}")))?;
        debug!(application_id = application_id.0, chat_id = chat_id.0, "chat resolved");
        Ok(chat_id)
    }

    pub async fn resolve_message(
        &self,
        token: &str,
        chat_number: i64,
        message_number: i64,
    ) -> Result<MessageId, ChatlogError> {
        let chat_id = self.resolve_chat(token, chat_number).await?;
        self.storage
            .message_id_by_number(chat_id, message_number)
            .await?
            .ok_or_else(|| {
                ChatlogError::not_found(
                    "message",
                    format!("{token}/{chat_number}/{message_number}"),
                )
            })
    }
}
