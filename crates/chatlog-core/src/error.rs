// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the chatlog service.

use thiserror::Error;

use crate::types::ResourceKind;

/// The primary error type used across all chatlog adapter traits and core operations.
///
/// `NotFound` and `Validation` are the caller's fault, and `QueueFull` and
/// `ShuttingDown` mean the pipeline cannot take the write right now. Both
/// kinds are reported synchronously to the submitter. `Storage` can surface
/// either synchronously, when resolving a token or number fails, or inside a
/// worker, where it only reaches clients as a generic task error.
#[derive(Debug, Error)]
pub enum ChatlogError {
    /// Primary store errors (connection, query failure, constraint violation).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Secondary search store errors.
    #[error("search index error: {source}")]
    Search {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A client-visible token or number did not resolve to a stored entity.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Request payload failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// The write queue for a resource kind is at capacity.
    #[error("write queue for {kind} is full")]
    QueueFull { kind: ResourceKind },

    /// The write pipeline is draining and no longer admits tasks.
    #[error("write pipeline is shutting down")]
    ShuttingDown,

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ChatlogError {
    /// Shorthand for a [`ChatlogError::NotFound`].
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    /// Returns true when the request itself was wrong.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Validation(_))
    }

    /// Returns true when the write pipeline refused work it could accept later.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::QueueFull { .. } | Self::ShuttingDown)
    }
}
