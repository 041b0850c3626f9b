// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the chatlog service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level chatlog configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChatlogConfig {
    /// Process-wide settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// HTTP gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Primary store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Secondary search store settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Write pipeline settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Process-wide configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Address to bind the listener to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind the listener to.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Base URL used to build `status_url` links, e.g. `https://chat.example.com`.
    /// When unset, links are built from the request's `Host` header.
    #[serde(default)]
    pub public_base_url: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_base_url: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Primary store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable SQLite WAL mode.
    #[serde(default = "default_true")]
    pub wal_mode: bool,

    /// How long a writer waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_database_path() -> String {
    "chatlog.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

/// Secondary search store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    /// Path to the SQLite file holding the full-text index.
    #[serde(default = "default_search_path")]
    pub database_path: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            database_path: default_search_path(),
        }
    }
}

fn default_search_path() -> String {
    "chatlog-search.db".to_string()
}

/// Write pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Capacity of each per-kind write queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Upper bound on one task's storage and indexing work.
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    /// How long a finished task stays queryable.
    #[serde(default = "default_task_ttl_secs")]
    pub task_ttl_secs: u64,

    /// Maximum number of tasks tracked at once. Oldest finished tasks are
    /// evicted first when the limit is reached.
    #[serde(default = "default_max_tracked_tasks")]
    pub max_tracked_tasks: usize,

    /// Interval between sweeps of expired task entries.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            task_timeout_secs: default_task_timeout_secs(),
            task_ttl_secs: default_task_ttl_secs(),
            max_tracked_tasks: default_max_tracked_tasks(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_task_timeout_secs() -> u64 {
    30
}

fn default_task_ttl_secs() -> u64 {
    3600
}

fn default_max_tracked_tasks() -> usize {
    100_000
}

fn default_sweep_interval_secs() -> u64 {
    60
}
