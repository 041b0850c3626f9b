// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter doubles for exercising failure and backpressure paths.
//!
//! - [`FailingSearch`] rejects every index call, so indexing failures can be
//!   observed without corrupting a real search database.
//! - [`GatedStorage`] wraps a real storage adapter and holds every mutation
//!   until its [`StorageGate`] is opened. Reads pass straight through.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::watch;

use chatlog_core::types::{
    Application, ApplicationId, Chat, ChatId, Message, MessageId, SearchDocument, SearchHit,
};
use chatlog_core::{
    AdapterType, ChatlogError, HealthStatus, PluginAdapter, SearchAdapter, StorageAdapter,
};

/// Search adapter whose writes always fail.
#[derive(Debug, Default)]
pub struct FailingSearch {
    attempts: AtomicUsize,
}

impl FailingSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of index calls seen so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PluginAdapter for FailingSearch {
    fn name(&self) -> &str {
        "failing-search"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Search
    }

    async fn health_check(&self) -> Result<HealthStatus, ChatlogError> {
        Ok(HealthStatus::Degraded("index writes disabled".into()))
    }

    async fn shutdown(&self) -> Result<(), ChatlogError> {
        Ok(())
    }
}

#[async_trait]
impl SearchAdapter for FailingSearch {
    async fn initialize(&self) -> Result<(), ChatlogError> {
        Ok(())
    }

    async fn index(&self, _document: &SearchDocument) -> Result<(), ChatlogError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(ChatlogError::Search {
            source: "search store unavailable".into(),
        })
    }

    async fn search(
        &self,
        _chat_id: ChatId,
        _query: &str,
        _limit: usize,
    ) -> Result<Vec<SearchHit>, ChatlogError> {
        Ok(Vec::new())
    }
}

/// Test-side control of a [`GatedStorage`].
#[derive(Debug, Clone)]
pub struct StorageGate {
    open: Arc<watch::Sender<bool>>,
    entered: Arc<watch::Sender<usize>>,
}

impl StorageGate {
    fn new() -> Self {
        let (open, _) = watch::channel(false);
        let (entered, _) = watch::channel(0usize);
        Self {
            open: Arc::new(open),
            entered: Arc::new(entered),
        }
    }

    /// Let every held and future mutation through.
    pub fn open(&self) {
        self.open.send_replace(true);
    }

    /// Number of mutations that have reached the gate.
    pub fn entered(&self) -> usize {
        *self.entered.borrow()
    }

    /// Wait until at least `count` mutations have reached the gate.
    pub async fn wait_entered(&self, count: usize) {
        let mut rx = self.entered.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|n| *n >= count).await;
    }

    async fn pass(&self) {
        self.entered.send_modify(|n| *n += 1);
        let mut rx = self.open.subscribe();
        let _ = rx.wait_for(|open| *open).await;
    }
}

/// Storage adapter that parks mutations behind a [`StorageGate`].
pub struct GatedStorage {
    inner: Arc<dyn StorageAdapter>,
    gate: StorageGate,
}

impl GatedStorage {
    pub fn new(inner: Arc<dyn StorageAdapter>) -> (Self, StorageGate) {
        let gate = StorageGate::new();
        let storage = Self {
            inner,
            gate: gate.clone(),
        };
        (storage, gate)
    }
}

#[async_trait]
impl PluginAdapter for GatedStorage {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn version(&self) -> semver::Version {
        self.inner.version()
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ChatlogError> {
        self.inner.health_check().await
    }

    async fn shutdown(&self) -> Result<(), ChatlogError> {
        self.inner.shutdown().await
    }
}

#[async_trait]
impl StorageAdapter for GatedStorage {
    async fn initialize(&self) -> Result<(), ChatlogError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), ChatlogError> {
        self.inner.close().await
    }

    async fn create_application(
        &self,
        name: &str,
        token: &str,
    ) -> Result<Application, ChatlogError> {
        self.inner.create_application(name, token).await
    }

    async fn list_applications(&self) -> Result<Vec<Application>, ChatlogError> {
        self.inner.list_applications().await
    }

    async fn get_application(&self, token: &str) -> Result<Option<Application>, ChatlogError> {
        self.inner.get_application(token).await
    }

    async fn update_application_name(
        &self,
        token: &str,
        name: &str,
    ) -> Result<Option<Application>, ChatlogError> {
        self.inner.update_application_name(token, name).await
    }

    async fn application_id_by_token(
        &self,
        token: &str,
    ) -> Result<Option<ApplicationId>, ChatlogError> {
        self.inner.application_id_by_token(token).await
    }

    async fn chat_id_by_number(
        &self,
        application_id: ApplicationId,
        number: i64,
    ) -> Result<Option<ChatId>, ChatlogError> {
        self.inner.chat_id_by_number(application_id, number).await
    }

    async fn message_id_by_number(
        &self,
        chat_id: ChatId,
        number: i64,
    ) -> Result<Option<MessageId>, ChatlogError> {
        self.inner.message_id_by_number(chat_id, number).await
    }

    async fn create_chat(
        &self,
        application_id: ApplicationId,
        subject: &str,
    ) -> Result<Chat, ChatlogError> {
        self.gate.pass().await;
        self.inner.create_chat(application_id, subject).await
    }

    async fn update_chat_subject(
        &self,
        chat_id: ChatId,
        subject: &str,
    ) -> Result<Chat, ChatlogError> {
        self.gate.pass().await;
        self.inner.update_chat_subject(chat_id, subject).await
    }

    async fn list_chats(&self, application_id: ApplicationId) -> Result<Vec<Chat>, ChatlogError> {
        self.inner.list_chats(application_id).await
    }

    async fn get_chat(
        &self,
        application_id: ApplicationId,
        number: i64,
    ) -> Result<Option<Chat>, ChatlogError> {
        self.inner.get_chat(application_id, number).await
    }

    async fn create_message(&self, chat_id: ChatId, body: &str) -> Result<Message, ChatlogError> {
        self.gate.pass().await;
        self.inner.create_message(chat_id, body).await
    }

    async fn update_message_body(
        &self,
        message_id: MessageId,
        body: &str,
    ) -> Result<Message, ChatlogError> {
        self.gate.pass().await;
        self.inner.update_message_body(message_id, body).await
    }

    async fn list_messages(&self, chat_id: ChatId) -> Result<Vec<Message>, ChatlogError> {
        self.inner.list_messages(chat_id).await
    }

    async fn get_message(
        &self,
        chat_id: ChatId,
        number: i64,
    ) -> Result<Option<Message>, ChatlogError> {
        self.inner.get_message(chat_id, number).await
    }
}
