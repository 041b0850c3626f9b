// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Search adapter trait for the secondary full-text store.

use async_trait::async_trait;

use crate::error::ChatlogError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ChatId, SearchDocument, SearchHit};

/// Adapter for the secondary search store.
///
/// The search store is never authoritative. It is written after the primary
/// store commits and shares no transaction with it.
#[async_trait]
pub trait SearchAdapter: PluginAdapter {
    /// Initializes the search backend.
    async fn initialize(&self) -> Result<(), ChatlogError>;

    /// Inserts or replaces the document keyed by [`SearchDocument::document_id`].
    async fn index(&self, document: &SearchDocument) -> Result<(), ChatlogError>;

    /// Searches the bodies of one chat's messages.
    async fn search(
        &self,
        chat_id: ChatId,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, ChatlogError>;
}
