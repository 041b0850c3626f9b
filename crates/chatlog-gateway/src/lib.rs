// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the chatlog service.
//!
//! Exposes application management, reads, and search synchronously, and
//! hands chat and message mutations to the write pipeline. Mutations answer
//! `202 Accepted` with a status URL under `/chats/status` or
//! `/messages/status`.

pub mod error;
pub mod handlers;
pub mod server;

pub use error::{ApiError, ErrorResponse};
pub use server::{GatewayState, router, serve};
