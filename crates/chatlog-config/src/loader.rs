// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./chatlog.toml` > `~/.config/chatlog/chatlog.toml` > `/etc/chatlog/chatlog.toml`
//! with environment variable overrides via `CHATLOG_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ChatlogConfig;

/// Config sections that environment variables may address.
const SECTIONS: &[&str] = &["service", "gateway", "storage", "search", "pipeline"];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/chatlog/chatlog.toml` (system-wide)
/// 3. `~/.config/chatlog/chatlog.toml` (user XDG config)
/// 4. `./chatlog.toml` (local directory)
/// 5. `CHATLOG_*` environment variables
pub fn load_config() -> Result<ChatlogConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing.
pub fn load_config_from_str(toml_content: &str) -> Result<ChatlogConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChatlogConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ChatlogConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChatlogConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(ChatlogConfig::default()))
        .merge(Toml::file("/etc/chatlog/chatlog.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("chatlog/chatlog.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("chatlog.toml"))
        .merge(env_provider())
}

/// Map a prefix-stripped, lowercased env var name to a dotted config key.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `pipeline_queue_capacity` maps to `pipeline.queue_capacity` rather than
/// `pipeline.queue.capacity`. Names without a known section pass through.
pub fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            if !rest.is_empty() {
                return format!("{section}.{rest}");
            }
        }
    }
    key.to_string()
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
fn env_provider() -> Env {
    Env::prefixed("CHATLOG_").map(|key| map_env_key(key.as_str()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_split_on_section_only() {
        assert_eq!(
            map_env_key("pipeline_queue_capacity"),
            "pipeline.queue_capacity"
        );
        assert_eq!(
            map_env_key("gateway_public_base_url"),
            "gateway.public_base_url"
        );
        assert_eq!(map_env_key("storage_wal_mode"), "storage.wal_mode");
        assert_eq!(map_env_key("search_database_path"), "search.database_path");
        assert_eq!(map_env_key("service_log_level"), "service.log_level");
    }

    #[test]
    fn unknown_env_keys_pass_through() {
        assert_eq!(map_env_key("whatever"), "whatever");
        assert_eq!(map_env_key("pipeline"), "pipeline");
    }

    #[test]
    fn explicit_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[gateway]\nport = 9999\n").unwrap();

        let config = load_config_from_path(&path).unwrap();
        assert_eq!(config.gateway.port, 9999);
        assert_eq!(config.gateway.host, "127.0.0.1");
    }
}
