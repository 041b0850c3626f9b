// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Concurrent store of asynchronous task outcomes.
//!
//! A task is inserted `Pending` when it is admitted to a write queue and moved
//! to `Completed` or `Error` exactly once by the worker that ran it. Finished
//! tasks stay readable for the configured TTL and are then swept. The number
//! of tracked tasks is capped; when the cap is hit the oldest finished tasks
//! are evicted first. Pending tasks are never evicted.

use std::time::Duration;

use chatlog_config::model::PipelineConfig;
use chatlog_core::{TaskId, TaskKind, TaskOutput};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum TaskState {
    Pending,
    Completed,
    Error,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskState::Pending)
    }
}

/// Client-visible view of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSnapshot {
    pub task_id: TaskId,
    pub kind: TaskKind,
    pub status: TaskState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A transition the store refused to apply.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatusError {
    #[error("task {0} is not tracked")]
    UnknownTask(TaskId),

    #[error("task {id} already finished as {status}")]
    AlreadyFinished { id: TaskId, status: TaskState },
}

#[derive(Debug)]
struct TaskEntry {
    kind: TaskKind,
    state: TaskState,
    result: Option<TaskOutput>,
    error: Option<String>,
    finished_at: Option<Instant>,
}

/// Sharded map of task id to outcome.
#[derive(Debug)]
pub struct TaskStatusStore {
    tasks: DashMap<TaskId, TaskEntry>,
    ttl: Duration,
    max_tracked: usize,
}

impl TaskStatusStore {
    pub fn new(ttl: Duration, max_tracked: usize) -> Self {
        Self {
            tasks: DashMap::new(),
            ttl,
            max_tracked: max_tracked.max(1),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            Duration::from_secs(config.task_ttl_secs),
            config.max_tracked_tasks,
        )
    }

    /// Track a newly admitted task as `Pending`.
    pub fn create(&self, id: TaskId, kind: TaskKind) {
        if self.tasks.len() >= self.max_tracked {
            self.evict_oldest_finished(self.tasks.len() + 1 - self.max_tracked);
        }
        self.tasks.insert(
            id,
            TaskEntry {
                kind,
                state: TaskState::Pending,
                result: None,
                error: None,
                finished_at: None,
            },
        );
    }

    /// Mark a task `Completed` with its result.
    pub fn set_result(&self, id: &TaskId, output: TaskOutput) -> Result<(), StatusError> {
        self.finish(id, TaskState::Completed, Some(output), None)
    }

    /// Mark a task `Error`.
    pub fn set_error(&self, id: &TaskId, message: impl Into<String>) -> Result<(), StatusError> {
        self.finish(id, TaskState::Error, None, Some(message.into()))
    }

    /// Mark a task `Error` while still reporting what was persisted.
    pub fn set_error_with_result(
        &self,
        id: &TaskId,
        message: impl Into<String>,
        output: TaskOutput,
    ) -> Result<(), StatusError> {
        self.finish(id, TaskState::Error, Some(output), Some(message.into()))
    }

    fn finish(
        &self,
        id: &TaskId,
        state: TaskState,
        result: Option<TaskOutput>,
        error: Option<String>,
    ) -> Result<(), StatusError> {
        let mut entry = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| StatusError::UnknownTask(id.clone()))?;
        if entry.state.is_terminal() {
            return Err(StatusError::AlreadyFinished {
                id: id.clone(),
                status: entry.state,
            });
        }
        entry.state = state;
        entry.result = result;
        entry.error = error;
        entry.finished_at = Some(Instant::now());
        Ok(())
    }

    /// Current view of a task. Expired tasks read as absent.
    pub fn get(&self, id: &TaskId) -> Option<TaskSnapshot> {
        self.get_at(id, Instant::now())
    }

    fn get_at(&self, id: &TaskId, now: Instant) -> Option<TaskSnapshot> {
        let entry = self.tasks.get(id)?;
        if self.is_expired(&entry, now) {
            return None;
        }
        Some(TaskSnapshot {
            task_id: id.clone(),
            kind: entry.kind,
            status: entry.state,
            result: entry.result.clone(),
            error: entry.error.clone(),
        })
    }

    /// Drop a task that was never handed to a worker.
    pub fn remove(&self, id: &TaskId) {
        self.tasks.remove(id);
    }

    /// Remove every task whose TTL has elapsed. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|_, entry| !self.is_expired(entry, now));
        let removed = before.saturating_sub(self.tasks.len());
        if removed > 0 {
            debug!(removed, "purged expired tasks");
        }
        removed
    }

    fn is_expired(&self, entry: &TaskEntry, now: Instant) -> bool {
        entry
            .finished_at
            .is_some_and(|at| now.saturating_duration_since(at) >= self.ttl)
    }

    fn evict_oldest_finished(&self, count: usize) {
        let mut finished: Vec<(TaskId, Instant)> = self
            .tasks
            .iter()
            .filter_map(|e| e.value().finished_at.map(|at| (e.key().clone(), at)))
            .collect();
        finished.sort_by_key(|(_, at)| *at);
        for (id, _) in finished.into_iter().take(count) {
            self.tasks.remove(&id);
        }
    }

    /// Number of tracked tasks, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|e| e.value().state == TaskState::Pending)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> TaskStatusStore {
        TaskStatusStore::new(Duration::from_secs(60), 100)
    }

    fn chat_output(number: i64) -> TaskOutput {
        TaskOutput::Chat {
            number,
            subject: "Hello".into(),
        }
    }

    #[test]
    fn created_task_is_pending() {
        let store = store();
        let id = TaskId::from("t1");
        store.create(id.clone(), TaskKind::CreateChat);

        let snap = store.get(&id).unwrap();
        assert_eq!(snap.status, TaskState::Pending);
        assert_eq!(snap.kind, TaskKind::CreateChat);
        assert!(snap.result.is_none());
        assert!(snap.error.is_none());
        assert_eq!(store.pending_count(), 1);
    }

    #[test]
    fn unknown_task_is_absent() {
        assert!(store().get(&TaskId::from("nope")).is_none());
    }

    #[test]
    fn result_is_terminal_and_single_shot() {
        let store = store();
        let id = TaskId::from("t1");
        store.create(id.clone(), TaskKind::CreateChat);

        store.set_result(&id, chat_output(1)).unwrap();
        let err = store.set_error(&id, "late").unwrap_err();
        assert_eq!(
            err,
            StatusError::AlreadyFinished {
                id: id.clone(),
                status: TaskState::Completed
            }
        );

        let snap = store.get(&id).unwrap();
        assert_eq!(snap.status, TaskState::Completed);
        assert_eq!(snap.result, Some(chat_output(1)));
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn repeated_reads_are_identical() {
        let store = store();
        let id = TaskId::from("t1");
        store.create(id.clone(), TaskKind::CreateMessage);
        store.set_error(&id, "failed to create message").unwrap();

        let first = store.get(&id).unwrap();
        let second = store.get(&id).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.error.as_deref(), Some("failed to create message"));
    }

    #[test]
    fn transition_on_unknown_task_is_refused() {
        let store = store();
        let id = TaskId::from("ghost");
        assert_eq!(
            store.set_result(&id, chat_output(1)).unwrap_err(),
            StatusError::UnknownTask(id)
        );
    }

    #[test]
    fn error_can_carry_persisted_result() {
        let store = store();
        let id = TaskId::from("t1");
        store.create(id.clone(), TaskKind::CreateMessage);
        let output = TaskOutput::Message {
            number: 4,
            body: "hi".into(),
        };
        store
            .set_error_with_result(&id, "message stored but search indexing failed", output.clone())
            .unwrap();

        let snap = store.get(&id).unwrap();
        assert_eq!(snap.status, TaskState::Error);
        assert_eq!(snap.result, Some(output));
    }

    #[test]
    fn finished_tasks_expire_but_pending_do_not() {
        let store = store();
        let done = TaskId::from("done");
        let waiting = TaskId::from("waiting");
        store.create(done.clone(), TaskKind::CreateChat);
        store.create(waiting.clone(), TaskKind::CreateChat);
        store.set_result(&done, chat_output(1)).unwrap();

        let later = Instant::now() + Duration::from_secs(61);
        assert!(store.get_at(&done, later).is_none());
        assert!(store.get_at(&waiting, later).is_some());

        assert_eq!(store.purge_expired_at(later), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get(&waiting).is_some());
    }

    #[test]
    fn cap_evicts_oldest_finished_first() {
        let store = TaskStatusStore::new(Duration::from_secs(60), 3);
        let ids: Vec<TaskId> = ["a", "b", "c"].into_iter().map(TaskId::from).collect();
        for id in &ids {
            store.create(id.clone(), TaskKind::CreateChat);
        }
        // "b" finishes before "c"; "a" stays pending.
        store.set_result(&ids[1], chat_output(1)).unwrap();
        std::thread::sleep(Duration::from_millis(2));
        store.set_result(&ids[2], chat_output(2)).unwrap();

        store.create(TaskId::from("d"), TaskKind::CreateChat);

        assert_eq!(store.len(), 3);
        assert!(store.get(&ids[0]).is_some());
        assert!(store.get(&ids[1]).is_none());
        assert!(store.get(&ids[2]).is_some());
    }

    #[test]
    fn cap_never_evicts_pending() {
        let store = TaskStatusStore::new(Duration::from_secs(60), 2);
        for id in ["a", "b", "c"] {
            store.create(TaskId::from(id), TaskKind::CreateChat);
        }
        assert_eq!(store.len(), 3);
        assert_eq!(store.pending_count(), 3);
    }

    #[test]
    fn snapshot_serializes_without_empty_fields() {
        let store = store();
        let id = TaskId::from("t1");
        store.create(id.clone(), TaskKind::CreateChat);
        store.set_result(&id, chat_output(1)).unwrap();

        let json = serde_json::to_value(store.get(&id).unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "task_id": "t1",
                "kind": "create_chat",
                "status": "Completed",
                "result": {"number": 1, "subject": "Hello"}
            })
        );
    }
}
