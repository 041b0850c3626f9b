// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Asynchronous write pipeline for the chatlog service.
//!
//! Requests flow `Dispatcher -> WriteCoordinator -> worker`, and clients poll
//! the [`TaskStatusStore`] for the outcome:
//!
//! - [`Dispatcher`] validates input and resolves tokens and numbers.
//! - [`WriteCoordinator`] owns one bounded queue and one sequential worker
//!   per resource kind.
//! - [`TaskStatusStore`] tracks every admitted task until it expires.

pub mod coordinator;
pub mod dispatcher;
pub mod shutdown;
pub mod status;
pub mod task;

pub use coordinator::{CoordinatorSettings, WorkerExit, WorkerOutcome, WriteCoordinator};
pub use dispatcher::Dispatcher;
pub use status::{StatusError, TaskSnapshot, TaskState, TaskStatusStore};
pub use task::{TaskHandle, WriteRequest, WriteTask};
