// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the chatlog service.
//!
//! This crate provides the error type, domain types, and the adapter traits
//! the write pipeline and the HTTP gateway are written against. The SQLite
//! primary store and the FTS5 search store implement the traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::ChatlogError;
pub use types::{
    AdapterType, ApplicationId, ChatId, HealthStatus, MessageId, ResourceKind, TaskId, TaskKind,
    TaskOutput,
};

pub use traits::{PluginAdapter, SearchAdapter, StorageAdapter};
