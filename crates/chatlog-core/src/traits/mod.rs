// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! Both backends extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod search;
pub mod storage;

pub use adapter::PluginAdapter;
pub use search::SearchAdapter;
pub use storage::StorageAdapter;
