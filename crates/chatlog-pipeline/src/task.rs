// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Write tasks carried by the per-kind queues.

use chatlog_core::{ApplicationId, ChatId, MessageId, TaskId, TaskKind};

/// A resolved mutation. All scope identifiers are internal ids, so a worker
/// never has to look up tokens or numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteRequest {
    CreateChat {
        application_id: ApplicationId,
        subject: String,
    },
    UpdateChat {
        chat_id: ChatId,
        subject: String,
    },
    CreateMessage {
        chat_id: ChatId,
        body: String,
    },
    UpdateMessage {
        message_id: MessageId,
        body: String,
    },
}

impl WriteRequest {
    pub fn kind(&self) -> TaskKind {
        match self {
            WriteRequest::CreateChat { .. } => TaskKind::CreateChat,
            WriteRequest::UpdateChat { .. } => TaskKind::UpdateChat,
            WriteRequest::CreateMessage { .. } => TaskKind::CreateMessage,
            WriteRequest::UpdateMessage { .. } => TaskKind::UpdateMessage,
        }
    }
}

/// A request paired with the id clients poll it by.
#[derive(Debug, Clone)]
pub struct WriteTask {
    pub id: TaskId,
    pub request: WriteRequest,
}

impl WriteTask {
    /// Wrap a request under a fresh random task id.
    pub fn new(request: WriteRequest) -> Self {
        Self {
            id: TaskId(uuid::Uuid::new_v4().to_string()),
            request,
        }
    }
}

/// Returned to callers once a task is admitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub task_id: TaskId,
    pub kind: TaskKind,
}
