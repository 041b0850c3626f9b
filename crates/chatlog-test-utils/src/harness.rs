// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end pipeline testing.
//!
//! `TestHarness` assembles the full write path over temp SQLite databases:
//! primary storage, search store, status store, coordinator, and dispatcher.

use std::sync::Arc;
use std::time::Duration;

use chatlog_config::model::ChatlogConfig;
use chatlog_core::types::Application;
use chatlog_core::{ChatlogError, SearchAdapter, StorageAdapter, TaskId};
use chatlog_pipeline::{
    CoordinatorSettings, Dispatcher, TaskSnapshot, TaskStatusStore, WorkerExit, WriteCoordinator,
};
use chatlog_search::SqliteSearch;
use chatlog_storage::SqliteStorage;
use tokio::sync::{Mutex, mpsc};

use crate::adapters::{FailingSearch, GatedStorage, StorageGate};

/// How long [`TestHarness::wait_for_terminal`] polls before giving up.
const TERMINAL_WAIT: Duration = Duration::from_secs(10);

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: ChatlogConfig,
    failing_search: bool,
    gated: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: ChatlogConfig::default(),
            failing_search: false,
            gated: false,
        }
    }

    /// Capacity of each write queue.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.pipeline.queue_capacity = capacity;
        self
    }

    /// Per-task timeout, in whole seconds.
    pub fn with_task_timeout_secs(mut self, secs: u64) -> Self {
        self.config.pipeline.task_timeout_secs = secs;
        self
    }

    /// Cap on tasks held by the status store.
    pub fn with_max_tracked_tasks(mut self, max: usize) -> Self {
        self.config.pipeline.max_tracked_tasks = max;
        self
    }

    /// Swap the search store for one that rejects every write.
    pub fn with_failing_search(mut self) -> Self {
        self.failing_search = true;
        self
    }

    /// Hold every storage mutation until [`TestHarness::gate`] is opened.
    pub fn with_gated_storage(mut self) -> Self {
        self.gated = true;
        self
    }

    /// Build the harness and start the coordinator.
    pub async fn build(mut self) -> Result<TestHarness, ChatlogError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| ChatlogError::Storage { source: e.into() })?;
        self.config.storage.database_path = path_in(&temp_dir, "chatlog.db");
        self.config.search.database_path = path_in(&temp_dir, "chatlog-search.db");

        let sqlite = SqliteStorage::new(self.config.storage.clone());
        sqlite.initialize().await?;
        let sqlite: Arc<dyn StorageAdapter> = Arc::new(sqlite);

        let (storage, gate): (Arc<dyn StorageAdapter>, Option<StorageGate>) = if self.gated {
            let (gated, gate) = GatedStorage::new(Arc::clone(&sqlite));
            (Arc::new(gated), Some(gate))
        } else {
            (sqlite, None)
        };

        let search: Arc<dyn SearchAdapter> = if self.failing_search {
            Arc::new(FailingSearch::new())
        } else {
            let search = SqliteSearch::new(&self.config.search);
            search.initialize().await?;
            Arc::new(search)
        };

        let status = Arc::new(TaskStatusStore::from_config(&self.config.pipeline));
        let (coordinator, exits) = WriteCoordinator::start(
            Arc::clone(&storage),
            Arc::clone(&search),
            Arc::clone(&status),
            CoordinatorSettings::from(&self.config.pipeline),
        );
        let coordinator = Arc::new(coordinator);
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&storage),
            Arc::clone(&coordinator),
        ));

        Ok(TestHarness {
            config: self.config,
            storage,
            search,
            status,
            coordinator,
            dispatcher,
            gate,
            exits: Mutex::new(exits),
            _temp_dir: temp_dir,
        })
    }
}

fn path_in(dir: &tempfile::TempDir, file: &str) -> String {
    dir.path().join(file).to_string_lossy().into_owned()
}

/// A running write pipeline over temp storage.
pub struct TestHarness {
    /// Configuration with the temp database paths filled in.
    pub config: ChatlogConfig,
    /// Primary storage (gated when built with `with_gated_storage`).
    pub storage: Arc<dyn StorageAdapter>,
    pub search: Arc<dyn SearchAdapter>,
    pub status: Arc<TaskStatusStore>,
    pub coordinator: Arc<WriteCoordinator>,
    pub dispatcher: Arc<Dispatcher>,
    /// Present only for gated harnesses.
    pub gate: Option<StorageGate>,
    exits: Mutex<mpsc::UnboundedReceiver<WorkerExit>>,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Default harness: real storage and search, default pipeline settings.
    pub async fn start() -> Result<Self, ChatlogError> {
        Self::builder().build().await
    }

    /// Register an application directly in storage.
    pub async fn create_application(
        &self,
        name: &str,
        token: &str,
    ) -> Result<Application, ChatlogError> {
        self.storage.create_application(name, token).await
    }

    /// Poll until the task leaves `Pending`.
    pub async fn wait_for_terminal(&self, task_id: &TaskId) -> Result<TaskSnapshot, ChatlogError> {
        wait_for_terminal(&self.dispatcher, task_id).await
    }

    /// Create a chat through the pipeline and wait for its number.
    pub async fn create_chat_and_wait(
        &self,
        token: &str,
        subject: &str,
    ) -> Result<TaskSnapshot, ChatlogError> {
        let handle = self.dispatcher.create_chat(token, subject).await?;
        self.wait_for_terminal(&handle.task_id).await
    }

    /// Stop the coordinator and wait for its workers to drain.
    pub async fn shutdown(&self) {
        self.coordinator.shutdown().await;
    }

    /// Next worker exit report, if one arrives within a second.
    pub async fn next_exit(&self) -> Option<WorkerExit> {
        let mut exits = self.exits.lock().await;
        tokio::time::timeout(Duration::from_secs(1), exits.recv())
            .await
            .ok()
            .flatten()
    }
}

/// Poll a dispatcher until the task reaches `Completed` or `Error`.
pub async fn wait_for_terminal(
    dispatcher: &Dispatcher,
    task_id: &TaskId,
) -> Result<TaskSnapshot, ChatlogError> {
    tokio::time::timeout(TERMINAL_WAIT, poll_terminal(dispatcher, task_id))
        .await
        .map_err(|_| ChatlogError::Timeout {
            duration: TERMINAL_WAIT,
        })?
}

async fn poll_terminal(
    dispatcher: &Dispatcher,
    task_id: &TaskId,
) -> Result<TaskSnapshot, ChatlogError> {
    loop {
        let snapshot = dispatcher.status(task_id)?;
        if snapshot.status.is_terminal() {
            return Ok(snapshot);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
