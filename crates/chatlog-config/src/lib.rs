// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the chatlog service.
//!
//! Provides TOML configuration parsing with strict validation (`deny_unknown_fields`),
//! XDG file hierarchy lookup, environment variable overrides, and diagnostic
//! error rendering with typo suggestions.
//!
//! # Usage
//!
//! ```no_run
//! use chatlog_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("listening on port {}", config.gateway.port);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::{Path, PathBuf};

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::ChatlogConfig;

/// Load configuration from the XDG hierarchy and validate it.
pub fn load_and_validate() -> Result<ChatlogConfig, Vec<ConfigError>> {
    finish(loader::load_config(), default_sources)
}

/// Load configuration from an explicit file (plus env overrides) and validate it.
pub fn load_and_validate_path(path: &Path) -> Result<ChatlogConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_path(path), || {
        read_sources(&[path.to_path_buf()])
    })
}

/// Load configuration from a TOML string and validate it.
///
/// Useful for testing and explicit configuration.
pub fn load_and_validate_str(toml_content: &str) -> Result<ChatlogConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

#[allow(clippy::result_large_err)]
fn finish(
    loaded: Result<ChatlogConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<ChatlogConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources())),
    }
}

/// The candidate config files, in the same order the loader merges them.
fn default_sources() -> Vec<(String, String)> {
    let mut paths = vec![PathBuf::from("/etc/chatlog/chatlog.toml")];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("chatlog/chatlog.toml"));
    }
    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join("chatlog.toml"));
    }
    read_sources(&paths)
}

fn read_sources(paths: &[PathBuf]) -> Vec<(String, String)> {
    paths
        .iter()
        .filter_map(|path| {
            std::fs::read_to_string(path)
                .ok()
                .map(|content| (path.display().to_string(), content))
        })
        .collect()
}
