// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded per-kind write queues, each drained by one sequential worker.
//!
//! [`WriteCoordinator::enqueue`] never blocks: a full queue rejects the task
//! and a closed one reports shutdown. Each worker allocates and persists
//! through the storage adapter, mirrors messages into the search adapter, and
//! records the outcome in the [`TaskStatusStore`]. A task that outlives the
//! per-task timeout is recorded as timed out once its in-flight write settles,
//! carrying the committed result if the write landed. Workers run until the
//! coordinator's [`CancellationToken`] fires, then close their queue, finish
//! what was already admitted, and report their exit on the supervision
//! channel returned by [`WriteCoordinator::start`].

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use chatlog_config::model::PipelineConfig;
use chatlog_core::types::{Message, SearchDocument};
use chatlog_core::{
    ChatlogError, ResourceKind, SearchAdapter, StorageAdapter, TaskId, TaskKind, TaskOutput,
};
use futures::future::join_all;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::status::TaskStatusStore;
use crate::task::{WriteRequest, WriteTask};

/// Error detail recorded when a message committed but could not be indexed.
pub const INDEX_FAILED: &str = "message stored but search indexing failed";

/// Error detail recorded when a task exceeds the per-task timeout.
pub const TIMED_OUT: &str = "timed out";

/// Tunables for [`WriteCoordinator::start`].
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub queue_capacity: usize,
    pub task_timeout: Duration,
    pub sweep_interval: Duration,
}

impl From<&PipelineConfig> for CoordinatorSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity,
            task_timeout: Duration::from_secs(config.task_timeout_secs),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
        }
    }
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

/// How a worker task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Drained its queue after cancellation or after every sender was dropped.
    Clean,
    /// Aborted before finishing.
    Failed(String),
    /// Panicked; the payload message is kept when it is a string.
    Panicked(String),
}

/// Sent once per worker on the supervision channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerExit {
    pub kind: ResourceKind,
    pub outcome: WorkerOutcome,
}

/// Owner of the write queues and their workers.
pub struct WriteCoordinator {
    chats: mpsc::Sender<WriteTask>,
    messages: mpsc::Sender<WriteTask>,
    status: Arc<TaskStatusStore>,
    cancel: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WriteCoordinator {
    /// Spawn one worker per resource kind plus the status sweeper.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        storage: Arc<dyn StorageAdapter>,
        search: Arc<dyn SearchAdapter>,
        status: Arc<TaskStatusStore>,
        settings: CoordinatorSettings,
    ) -> (Self, mpsc::UnboundedReceiver<WorkerExit>) {
        let cancel = CancellationToken::new();
        let capacity = settings.queue_capacity.max(1);
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        let (chats_tx, chats_rx) = mpsc::channel(capacity);
        let (messages_tx, messages_rx) = mpsc::channel(capacity);

        let mut handles = Vec::with_capacity(3);
        for (kind, rx) in [
            (ResourceKind::Chats, chats_rx),
            (ResourceKind::Messages, messages_rx),
        ] {
            let worker = Worker {
                kind,
                storage: Arc::clone(&storage),
                search: Arc::clone(&search),
                status: Arc::clone(&status),
                timeout: settings.task_timeout,
                cancel: cancel.clone(),
            };
            let handle = tokio::spawn(worker.run(rx));
            handles.push(supervise(kind, handle, exit_tx.clone()));
        }
        handles.push(tokio::spawn(sweep(
            Arc::clone(&status),
            settings.sweep_interval,
            cancel.clone(),
        )));

        info!(
            capacity,
            task_timeout = ?settings.task_timeout,
            "write coordinator started"
        );

        let coordinator = Self {
            chats: chats_tx,
            messages: messages_tx,
            status,
            cancel,
            handles: Mutex::new(handles),
        };
        (coordinator, exit_rx)
    }

    /// Admit a task without waiting for it to run.
    ///
    /// A queue slot is reserved first and the task is tracked as `Pending`
    /// only once it holds one, so a rejected task is never observable
    /// through the status store.
    pub fn enqueue(&self, request: WriteRequest) -> Result<TaskId, ChatlogError> {
        if self.cancel.is_cancelled() {
            return Err(ChatlogError::ShuttingDown);
        }

        let kind = request.kind();
        let resource = kind.resource();
        let task = WriteTask::new(request);
        let id = task.id.clone();

        // Hold a queue slot before tracking the task, so a rejected
        // submission never touches the status store.
        let permit = match self.sender(resource).try_reserve() {
            Ok(permit) => permit,
            Err(TrySendError::Full(())) => {
                warn!(kind = %resource, "write queue full, rejecting task");
                return Err(ChatlogError::QueueFull { kind: resource });
            }
            Err(TrySendError::Closed(())) => return Err(ChatlogError::ShuttingDown),
        };
        self.status.create(id.clone(), kind);
        permit.send(task);
        debug!(task_id = %id, kind = %kind, "task enqueued");
        Ok(id)
    }

    /// Number of tasks waiting in a queue.
    pub fn queue_depth(&self, kind: ResourceKind) -> usize {
        let tx = self.sender(kind);
        tx.max_capacity() - tx.capacity()
    }

    pub fn status(&self) -> &Arc<TaskStatusStore> {
        &self.status
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop admitting tasks, let the workers drain, and wait for them.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handles = std::mem::take(&mut *self.handles.lock().await);
        for joined in join_all(handles).await {
            if let Err(e) = joined {
                warn!(error = %e, "pipeline task did not stop cleanly");
            }
        }
        info!("write coordinator stopped");
    }

    fn sender(&self, kind: ResourceKind) -> &mpsc::Sender<WriteTask> {
        match kind {
            ResourceKind::Chats => &self.chats,
            ResourceKind::Messages => &self.messages,
        }
    }
}

/// Forward a worker's termination to the supervision channel.
fn supervise(
    kind: ResourceKind,
    worker: JoinHandle<()>,
    exits: mpsc::UnboundedSender<WorkerExit>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let outcome = match worker.await {
            Ok(()) => WorkerOutcome::Clean,
            Err(e) if e.is_panic() => WorkerOutcome::Panicked(panic_message(e.into_panic())),
            Err(e) => WorkerOutcome::Failed(e.to_string()),
        };
        if outcome == WorkerOutcome::Clean {
            info!(kind = %kind, "worker exited");
        } else {
            error!(kind = %kind, outcome = ?outcome, "worker exited abnormally");
        }
        // The receiver may already be gone during process teardown.
        let _ = exits.send(WorkerExit { kind, outcome });
    })
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

async fn sweep(status: Arc<TaskStatusStore>, every: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(every.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                status.purge_expired();
            }
        }
    }
}

enum TaskFailure {
    Storage(ChatlogError),
    Index {
        output: TaskOutput,
        source: ChatlogError,
    },
}

struct Worker {
    kind: ResourceKind,
    storage: Arc<dyn StorageAdapter>,
    search: Arc<dyn SearchAdapter>,
    status: Arc<TaskStatusStore>,
    timeout: Duration,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self, mut rx: mpsc::Receiver<WriteTask>) {
        debug!(kind = %self.kind, "worker started");
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                next = rx.recv() => match next {
                    Some(task) => self.process(task).await,
                    None => return,
                },
            }
        }

        rx.close();
        let mut drained = 0usize;
        while let Some(task) = rx.recv().await {
            self.process(task).await;
            drained += 1;
        }
        info!(kind = %self.kind, drained, "worker drained queue");
    }

    async fn process(&self, task: WriteTask) {
        let WriteTask { id, request } = task;
        let kind = request.kind();
        let span = info_span!("write_task", task_id = %id, kind = %kind);

        async {
            let mut work = std::pin::pin!(self.execute(request));
            let recorded = match tokio::time::timeout(self.timeout, &mut work).await {
                Ok(Ok(output)) => {
                    debug!("task completed");
                    self.status.set_result(&id, output)
                }
                Ok(Err(TaskFailure::Storage(e))) => {
                    error!(error = %e, "storage write failed");
                    self.status.set_error(&id, failure_message(kind))
                }
                Ok(Err(TaskFailure::Index { output, source })) => {
                    warn!(error = %source, "search indexing failed after commit");
                    self.status.set_error_with_result(&id, INDEX_FAILED, output)
                }
                Err(_) => {
                    // Dropping the future would not stop a statement already
                    // handed to the connection thread, so wait for it to
                    // settle and report whatever it persisted.
                    warn!(timeout = ?self.timeout, "task timed out, waiting for in-flight write");
                    match work.await {
                        Ok(output) | Err(TaskFailure::Index { output, .. }) => {
                            self.status.set_error_with_result(&id, TIMED_OUT, output)
                        }
                        Err(TaskFailure::Storage(e)) => {
                            debug!(error = %e, "timed-out write did not persist");
                            self.status.set_error(&id, TIMED_OUT)
                        }
                    }
                }
            };
            if let Err(e) = recorded {
                warn!(error = %e, "task outcome not recorded");
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, request: WriteRequest) -> Result<TaskOutput, TaskFailure> {
        match request {
            WriteRequest::CreateChat {
                application_id,
                subject,
            } => self
                .storage
                .create_chat(application_id, &subject)
                .await
                .map(|chat| TaskOutput::from(&chat))
                .map_err(TaskFailure::Storage),
            WriteRequest::UpdateChat { chat_id, subject } => self
                .storage
                .update_chat_subject(chat_id, &subject)
                .await
                .map(|chat| TaskOutput::from(&chat))
                .map_err(TaskFailure::Storage),
            WriteRequest::CreateMessage { chat_id, body } => {
                let message = self
                    .storage
                    .create_message(chat_id, &body)
                    .await
                    .map_err(TaskFailure::Storage)?;
                self.index(&message).await
            }
            WriteRequest::UpdateMessage { message_id, body } => {
                let message = self
                    .storage
                    .update_message_body(message_id, &body)
                    .await
                    .map_err(TaskFailure::Storage)?;
                self.index(&message).await
            }
        }
    }

    async fn index(&self, message: &Message) -> Result<TaskOutput, TaskFailure> {
        let output = TaskOutput::from(message);
        match self.search.index(&SearchDocument::from(message)).await {
            Ok(()) => Ok(output),
            Err(source) => Err(TaskFailure::Index { output, source }),
        }
    }
}

/// Client-facing detail for a failed primary write. The cause is only logged.
fn failure_message(kind: TaskKind) -> &'static str {
    match kind {
        TaskKind::CreateChat => "failed to create chat",
        TaskKind::UpdateChat => "failed to update chat",
        TaskKind::CreateMessage => "failed to create message",
        TaskKind::UpdateMessage => "failed to update message",
    }
}
