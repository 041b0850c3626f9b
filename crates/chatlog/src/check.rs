// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chatlog check` command implementation.
//!
//! Runs quick diagnostics against the configured environment: both stores
//! open and migrate, the primary database passes an integrity check, and the
//! gateway address can be bound. Exits non-zero when any check fails.

use std::io::IsTerminal;
use std::path::Path;
use std::time::{Duration, Instant};

use chatlog_config::model::ChatlogConfig;
use chatlog_core::{ChatlogError, HealthStatus, PluginAdapter, SearchAdapter, StorageAdapter};
use chatlog_search::SqliteSearch;
use chatlog_storage::SqliteStorage;

/// Status of a diagnostic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Run the `chatlog check` command.
///
/// The configuration has already been loaded and validated by the time this
/// runs, so the config check always passes.
pub async fn run_check(config: &ChatlogConfig) -> Result<(), ChatlogError> {
    let use_color = std::io::stdout().is_terminal();

    let results = vec![
        CheckResult::new("Configuration", CheckStatus::Pass, "valid", Instant::now()),
        check_storage(config).await,
        check_search(config).await,
        check_integrity(&config.storage.database_path).await,
        check_gateway_bind(&config.gateway.host, config.gateway.port).await,
        check_memory_baseline(),
    ];

    println!();
    println!("  chatlog check");
    println!("  {}", "-".repeat(50));

    let mut fail_count = 0;
    let mut warn_count = 0;
    for result in &results {
        match result.status {
            CheckStatus::Fail => fail_count += 1,
            CheckStatus::Warn => warn_count += 1,
            CheckStatus::Pass => {}
        }
        println!("{}", render_line(result, use_color));
    }

    println!();
    if fail_count > 0 || warn_count > 0 {
        let issues = fail_count + warn_count;
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
    } else {
        println!("  All checks passed.");
    }
    println!();

    if fail_count > 0 {
        return Err(ChatlogError::Internal(format!("{fail_count} check(s) failed")));
    }
    Ok(())
}

fn render_line(result: &CheckResult, use_color: bool) -> String {
    let duration_ms = result.duration.as_millis();
    if use_color {
        use colored::Colorize;
        let (symbol, message) = match result.status {
            CheckStatus::Pass => ("✓".green(), result.message.normal()),
            CheckStatus::Warn => ("!".yellow(), result.message.yellow()),
            CheckStatus::Fail => ("✗".red(), result.message.red()),
        };
        format!(
            "    {symbol} {:<20} {message} ({duration_ms}ms)",
            result.name
        )
    } else {
        let tag = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        format!(
            "    {tag} {:<20} {} ({duration_ms}ms)",
            result.name, result.message
        )
    }
}

fn health_result(name: &str, health: Result<HealthStatus, ChatlogError>, start: Instant) -> CheckResult {
    match health {
        Ok(HealthStatus::Healthy) => CheckResult::new(name, CheckStatus::Pass, "healthy", start),
        Ok(HealthStatus::Degraded(reason)) => {
            CheckResult::new(name, CheckStatus::Warn, format!("degraded: {reason}"), start)
        }
        Ok(HealthStatus::Unhealthy(reason)) => {
            CheckResult::new(name, CheckStatus::Fail, format!("unhealthy: {reason}"), start)
        }
        Err(e) => CheckResult::new(name, CheckStatus::Fail, e.to_string(), start),
    }
}

/// Open the primary store, apply migrations, and probe it.
async fn check_storage(config: &ChatlogConfig) -> CheckResult {
    let start = Instant::now();
    let path = &config.storage.database_path;
    if path != ":memory:" && !Path::new(path).exists() {
        return CheckResult::new(
            "Storage",
            CheckStatus::Warn,
            format!("not found: {path} (will be created on first run)"),
            start,
        );
    }

    let storage = SqliteStorage::new(config.storage.clone());
    if let Err(e) = storage.initialize().await {
        return CheckResult::new("Storage", CheckStatus::Fail, format!("open failed: {e}"), start);
    }
    let result = health_result("Storage", storage.health_check().await, start);
    let _ = storage.shutdown().await;
    result
}

/// Open the search store, apply migrations, and probe it.
async fn check_search(config: &ChatlogConfig) -> CheckResult {
    let start = Instant::now();
    let path = &config.search.database_path;
    if path != ":memory:" && !Path::new(path).exists() {
        return CheckResult::new(
            "Search",
            CheckStatus::Warn,
            format!("not found: {path} (will be created on first run)"),
            start,
        );
    }

    let search = SqliteSearch::new(&config.search);
    if let Err(e) = search.initialize().await {
        return CheckResult::new("Search", CheckStatus::Fail, format!("open failed: {e}"), start);
    }
    let result = health_result("Search", search.health_check().await, start);
    let _ = search.shutdown().await;
    result
}

/// SQLite integrity check of the primary database.
async fn check_integrity(db_path: &str) -> CheckResult {
    let start = Instant::now();
    if !Path::new(db_path).exists() {
        return CheckResult::new(
            "DB integrity",
            CheckStatus::Warn,
            "database not found (skipped)",
            start,
        );
    }

    let conn = match tokio_rusqlite::Connection::open(db_path).await {
        Ok(conn) => conn,
        Err(e) => {
            return CheckResult::new(
                "DB integrity",
                CheckStatus::Fail,
                format!("open failed: {e}"),
                start,
            );
        }
    };

    let rows = conn
        .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
            let mut stmt = conn.prepare("PRAGMA integrity_check")?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await;

    match rows {
        Ok(rows) if rows.len() == 1 && rows[0] == "ok" => {
            CheckResult::new("DB integrity", CheckStatus::Pass, "ok", start)
        }
        Ok(rows) => CheckResult::new(
            "DB integrity",
            CheckStatus::Fail,
            format!("{} issue(s) found", rows.len()),
            start,
        ),
        Err(e) => CheckResult::new(
            "DB integrity",
            CheckStatus::Fail,
            format!("check failed: {e}"),
            start,
        ),
    }
}

/// Try to bind the gateway address. A busy port usually means a running
/// instance, so it only warns.
async fn check_gateway_bind(host: &str, port: u16) -> CheckResult {
    let start = Instant::now();
    let addr = format!("{host}:{port}");
    match tokio::net::TcpListener::bind(&addr).await {
        Ok(_listener) => CheckResult::new("Gateway", CheckStatus::Pass, format!("{addr} available"), start),
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => CheckResult::new(
            "Gateway",
            CheckStatus::Warn,
            format!("{addr} in use (chatlog may already be running)"),
            start,
        ),
        Err(e) => CheckResult::new(
            "Gateway",
            CheckStatus::Fail,
            format!("cannot bind {addr}: {e}"),
            start,
        ),
    }
}

/// Memory baseline via jemalloc.
fn check_memory_baseline() -> CheckResult {
    let start = Instant::now();

    #[cfg(not(target_env = "msvc"))]
    {
        let _ = tikv_jemalloc_ctl::epoch::advance();
        let allocated = tikv_jemalloc_ctl::stats::allocated::read().unwrap_or(0);
        let resident = tikv_jemalloc_ctl::stats::resident::read().unwrap_or(0);
        let allocated_mb = allocated as f64 / (1024.0 * 1024.0);
        let resident_mb = resident as f64 / (1024.0 * 1024.0);
        CheckResult::new(
            "Memory baseline",
            CheckStatus::Pass,
            format!("heap: {allocated_mb:.1} MB, resident: {resident_mb:.1} MB"),
            start,
        )
    }

    #[cfg(target_env = "msvc")]
    {
        CheckResult::new(
            "Memory baseline",
            CheckStatus::Warn,
            "jemalloc not available on MSVC",
            start,
        )
    }
}
