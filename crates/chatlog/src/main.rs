// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! chatlog - multi-tenant chat service with an asynchronous write pipeline.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod check;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// chatlog - multi-tenant chat service.
#[derive(Parser, Debug)]
#[command(name = "chatlog", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the default search path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP gateway and write pipeline.
    Serve,
    /// Validate configuration and probe both stores, then exit.
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => chatlog_config::load_and_validate_path(path),
        None => chatlog_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            chatlog_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Check) => check::run_check(&config).await,
        None => {
            println!("chatlog: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the stats epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::parse_from(["chatlog", "serve", "--config", "/tmp/chatlog.toml"]);
        assert!(matches!(cli.command, Some(Commands::Serve)));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/chatlog.toml")));

        let cli = Cli::parse_from(["chatlog", "check"]);
        assert!(matches!(cli.command, Some(Commands::Check)));
        assert!(cli.config.is_none());
    }

    #[test]
    fn default_config_validates() {
        let config = chatlog_config::load_and_validate_str("").unwrap();
        assert_eq!(config.gateway.port, 8080);
    }
}
