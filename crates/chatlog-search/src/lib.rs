// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Secondary full-text search store for the chatlog service.
//!
//! Message bodies are mirrored into a separate SQLite database with an FTS5
//! index after the primary write commits. The index is eventually consistent
//! with the primary store and never authoritative.

pub mod migrations;
pub mod query;
pub mod store;

pub use store::SqliteSearch;
