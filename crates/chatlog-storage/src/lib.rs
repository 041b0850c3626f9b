// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the chatlog service.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, gapless
//! per-scope sequence allocation, and typed CRUD operations for
//! applications, chats, and messages.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;
pub mod sequence;

pub use adapter::SqliteStorage;
pub use database::{Database, DatabaseOptions};
pub use sequence::Scope;
