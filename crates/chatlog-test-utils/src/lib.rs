// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for chatlog integration tests.
//!
//! Provides adapter doubles and a harness for fast, deterministic tests that
//! run the real write pipeline against temp SQLite databases.
//!
//! # Components
//!
//! - [`TestHarness`] - Storage, search, coordinator, and dispatcher wired together
//! - [`FailingSearch`] - Search store whose writes always fail
//! - [`GatedStorage`] - Storage that holds mutations until released

pub mod adapters;
pub mod harness;

pub use adapters::{FailingSearch, GatedStorage, StorageGate};
pub use harness::{TestHarness, TestHarnessBuilder, wait_for_terminal};
