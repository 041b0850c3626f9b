// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as valid listen addresses, non-empty paths, and positive capacities.

use crate::diagnostic::ConfigError;
use crate::model::ChatlogConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &ChatlogConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let level = config.service.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "service.log_level `{}` must be one of {}",
            config.service.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("gateway.host must not be empty"));
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::validation(format!(
                "gateway.host `{host}` is not a valid IP address or hostname"
            )));
        }
    }

    if config.gateway.port == 0 {
        errors.push(ConfigError::validation("gateway.port must not be 0"));
    }

    if let Some(base) = &config.gateway.public_base_url {
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            errors.push(ConfigError::validation(format!(
                "gateway.public_base_url `{base}` must start with http:// or https://"
            )));
        }
    }

    let storage_path = config.storage.database_path.trim();
    let search_path = config.search.database_path.trim();
    if storage_path.is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }
    if search_path.is_empty() {
        errors.push(ConfigError::validation(
            "search.database_path must not be empty",
        ));
    }
    if !storage_path.is_empty() && storage_path == search_path && storage_path != ":memory:" {
        errors.push(ConfigError::validation(
            "search.database_path must differ from storage.database_path",
        ));
    }

    let pipeline = &config.pipeline;
    for (key, value) in [
        ("pipeline.queue_capacity", pipeline.queue_capacity as u64),
        ("pipeline.task_timeout_secs", pipeline.task_timeout_secs),
        ("pipeline.task_ttl_secs", pipeline.task_ttl_secs),
        ("pipeline.max_tracked_tasks", pipeline.max_tracked_tasks as u64),
        ("pipeline.sweep_interval_secs", pipeline.sweep_interval_secs),
    ] {
        if value == 0 {
            errors.push(ConfigError::validation(format!(
                "{key} must be greater than 0"
            )));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(config: &ChatlogConfig) -> Vec<String> {
        validate_config(config)
            .unwrap_err()
            .into_iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&ChatlogConfig::default()).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = ChatlogConfig::default();
        config.storage.database_path = "".to_string();
        let errors = messages(&config);
        assert!(errors.iter().any(|m| m.contains("storage.database_path")));
    }

    #[test]
    fn shared_database_file_fails_validation() {
        let mut config = ChatlogConfig::default();
        config.search.database_path = config.storage.database_path.clone();
        let errors = messages(&config);
        assert!(errors.iter().any(|m| m.contains("must differ")));
    }

    #[test]
    fn zero_capacity_and_ttl_are_both_reported() {
        let mut config = ChatlogConfig::default();
        config.pipeline.queue_capacity = 0;
        config.pipeline.task_ttl_secs = 0;
        let errors = messages(&config);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|m| m.contains("queue_capacity")));
        assert!(errors.iter().any(|m| m.contains("task_ttl_secs")));
    }

    #[test]
    fn unknown_log_level_fails_validation() {
        let mut config = ChatlogConfig::default();
        config.service.log_level = "verbose".to_string();
        let errors = messages(&config);
        assert!(errors.iter().any(|m| m.contains("service.log_level")));
    }

    #[test]
    fn public_base_url_needs_a_scheme() {
        let mut config = ChatlogConfig::default();
        config.gateway.public_base_url = Some("chat.example.com".to_string());
        let errors = messages(&config);
        assert!(errors.iter().any(|m| m.contains("public_base_url")));

        config.gateway.public_base_url = Some("https://chat.example.com".to_string());
        assert!(validate_config(&config).is_ok());
    }
}
