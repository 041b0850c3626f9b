// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chatlog serve` command implementation.
//!
//! Opens both stores, starts the write coordinator, and serves the HTTP
//! gateway until SIGINT/SIGTERM or an unexpected worker exit. Shutdown stops
//! the gateway first so no new writes are admitted, then drains the queues,
//! then closes the stores.

use std::sync::Arc;

use chatlog_config::model::ChatlogConfig;
use chatlog_core::{ChatlogError, SearchAdapter, StorageAdapter};
use chatlog_gateway::GatewayState;
use chatlog_pipeline::shutdown;
use chatlog_pipeline::{
    CoordinatorSettings, Dispatcher, TaskStatusStore, WorkerExit, WorkerOutcome, WriteCoordinator,
};
use chatlog_search::SqliteSearch;
use chatlog_storage::SqliteStorage;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Runs the `chatlog serve` command.
pub async fn run_serve(config: ChatlogConfig) -> Result<(), ChatlogError> {
    init_tracing(&config.service.log_level);

    info!("starting chatlog serve");

    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    let storage: Arc<dyn StorageAdapter> = Arc::new(storage);

    let search = SqliteSearch::new(&config.search);
    search.initialize().await?;
    let search: Arc<dyn SearchAdapter> = Arc::new(search);

    let status = Arc::new(TaskStatusStore::from_config(&config.pipeline));
    let (coordinator, exits) = WriteCoordinator::start(
        Arc::clone(&storage),
        Arc::clone(&search),
        status,
        CoordinatorSettings::from(&config.pipeline),
    );
    let coordinator = Arc::new(coordinator);
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&storage),
        Arc::clone(&coordinator),
    ));

    let cancel = shutdown::install_signal_handler();
    let watchdog = tokio::spawn(watch_workers(exits, cancel.clone()));

    let state = GatewayState::new(
        Arc::clone(&storage),
        Arc::clone(&search),
        dispatcher,
        config.gateway.public_base_url.clone(),
    );
    let server = {
        let gateway = config.gateway.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { chatlog_gateway::serve(&gateway, state, cancel).await })
    };

    let served = match server.await {
        Ok(result) => result,
        Err(e) => Err(ChatlogError::Internal(format!("gateway task failed: {e}"))),
    };

    // The gateway is down; stop admitting and drain whatever was queued.
    cancel.cancel();
    coordinator.shutdown().await;
    if let Err(e) = watchdog.await {
        warn!(error = %e, "worker watchdog did not stop cleanly");
    }

    if let Err(e) = search.shutdown().await {
        warn!(error = %e, "search store shutdown failed");
    }
    if let Err(e) = storage.shutdown().await {
        warn!(error = %e, "storage shutdown failed");
    }

    served?;
    info!("chatlog serve shutdown complete");
    Ok(())
}

/// Trigger shutdown if a worker exits while the service is still running.
///
/// Workers only return after cancellation, so an exit seen first is fatal.
async fn watch_workers(mut exits: mpsc::UnboundedReceiver<WorkerExit>, cancel: CancellationToken) {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {}
        exit = exits.recv() => {
            if let Some(WorkerExit { kind, outcome }) = exit {
                match outcome {
                    WorkerOutcome::Panicked(message) => {
                        error!(kind = %kind, panic = %message, "write worker panicked, shutting down");
                    }
                    other => {
                        error!(kind = %kind, outcome = ?other, "write worker stopped unexpectedly, shutting down");
                    }
                }
            }
            cancel.cancel();
        }
    }
}

/// Initialize the tracing subscriber with an env filter.
///
/// `RUST_LOG` wins when set; otherwise chatlog crates log at the configured
/// level and everything else at `warn`.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chatlog={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
